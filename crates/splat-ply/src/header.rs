//! Line-oriented PLY header parsing.
//!
//! Only the ASCII header is interpreted here. Binary element data is located
//! through [`PlyHeader::element_regions`], which derives each element's byte
//! range from the declared property types.

use std::str::FromStr;

use strum::EnumString;

use crate::error::{FormatError, Result};

/// Upper bound on the number of bytes inspected while looking for the header.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

const MAGIC: &[u8] = b"ply";
const END_HEADER: &[u8] = b"end_header";

/// Body encoding declared by the `format` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Encoding {
    /// Whitespace separated text records.
    Ascii,
    /// Packed little-endian records.
    BinaryLittleEndian,
    /// Packed big-endian records.
    BinaryBigEndian,
}

/// Fixed-size scalar property type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString)]
pub enum ScalarType {
    #[strum(serialize = "char", serialize = "int8")]
    Int8,
    #[strum(serialize = "uchar", serialize = "uint8")]
    UInt8,
    #[strum(serialize = "short", serialize = "int16")]
    Int16,
    #[strum(serialize = "ushort", serialize = "uint16")]
    UInt16,
    #[strum(serialize = "int", serialize = "int32")]
    Int32,
    #[strum(serialize = "uint", serialize = "uint32")]
    UInt32,
    #[strum(serialize = "float", serialize = "float32")]
    Float32,
    #[strum(serialize = "double", serialize = "float64")]
    Float64,
}

impl ScalarType {
    /// Size of one value in bytes.
    pub const fn size(self) -> u64 {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Canonical header spelling.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "char",
            Self::UInt8 => "uchar",
            Self::Int16 => "short",
            Self::UInt16 => "ushort",
            Self::Int32 => "int",
            Self::UInt32 => "uint",
            Self::Float32 => "float",
            Self::Float64 => "double",
        }
    }

    /// Decodes one little-endian value from the front of `bytes`.
    pub(crate) fn read_le(self, bytes: &[u8]) -> Option<f64> {
        let value = match self {
            Self::Int8 => f64::from(i8::from_le_bytes(bytes.get(..1)?.try_into().ok()?)),
            Self::UInt8 => f64::from(*bytes.first()?),
            Self::Int16 => f64::from(i16::from_le_bytes(bytes.get(..2)?.try_into().ok()?)),
            Self::UInt16 => f64::from(u16::from_le_bytes(bytes.get(..2)?.try_into().ok()?)),
            Self::Int32 => f64::from(i32::from_le_bytes(bytes.get(..4)?.try_into().ok()?)),
            Self::UInt32 => f64::from(u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?)),
            Self::Float32 => f64::from(f32::from_le_bytes(bytes.get(..4)?.try_into().ok()?)),
            Self::Float64 => f64::from_le_bytes(bytes.get(..8)?.try_into().ok()?),
        };
        Some(value)
    }
}

/// Declared shape of a single property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// One fixed-size value per element.
    Scalar(ScalarType),
    /// A length-prefixed list; makes the owning element's stride variable.
    List { count: ScalarType, item: ScalarType },
}

/// A named property of an element group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyKind,
}

/// An element group (`element <name> <count>`) and its ordered properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub count: u64,
    pub properties: Vec<Property>,
}

impl Element {
    /// Bytes per record, or `None` when a list property makes it variable.
    pub fn stride(&self) -> Option<u64> {
        self.properties
            .iter()
            .try_fold(0u64, |stride, property| match property.kind {
                PropertyKind::Scalar(scalar) => stride.checked_add(scalar.size()),
                PropertyKind::List { .. } => None,
            })
    }

    /// Total bytes occupied by this element's records, when fixed.
    pub fn byte_len(&self) -> Option<u64> {
        self.stride()?.checked_mul(self.count)
    }

    /// Declared property names in order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|property| property.name.as_str())
    }

    /// Returns `true` if a property with this name is declared.
    pub fn has_property(&self, name: &str) -> bool {
        self.property_names().any(|declared| declared == name)
    }
}

/// Absolute byte range of an element's records within the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub offset: u64,
    pub len: u64,
}

impl Region {
    /// Exclusive end offset.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.len)
    }
}

/// Parsed PLY header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyHeader {
    pub encoding: Encoding,
    pub version: String,
    pub elements: Vec<Element>,
    pub comments: Vec<String>,
    /// Length of the header in bytes, including the `end_header` newline.
    pub header_len: usize,
}

impl PlyHeader {
    /// Parses the header at the start of `bytes`.
    ///
    /// At most [`MAX_HEADER_BYTES`] are inspected. Any malformed or truncated
    /// header is reported as a [`FormatError`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(FormatError::Empty);
        }

        let window = &bytes[..bytes.len().min(MAX_HEADER_BYTES)];
        if !window.starts_with(MAGIC) || !matches!(window.get(MAGIC.len()), Some(b'\n' | b'\r'))
        {
            return Err(FormatError::MissingMagic);
        }

        let header_len = find_header_end(window).ok_or(FormatError::UnterminatedHeader {
            limit: MAX_HEADER_BYTES,
        })?;
        let text = std::str::from_utf8(&window[..header_len])
            .map_err(|err| FormatError::invalid_header(0, format!("header is not text: {err}")))?;

        let mut format: Option<(Encoding, String)> = None;
        let mut elements: Vec<Element> = Vec::new();
        let mut comments = Vec::new();

        for (index, raw_line) in text.lines().enumerate() {
            let line = index + 1;
            let mut tokens = raw_line.split_ascii_whitespace();
            let Some(keyword) = tokens.next() else {
                continue;
            };

            match keyword {
                "ply" if line == 1 => {}
                "format" => {
                    if format.is_some() {
                        return Err(FormatError::invalid_header(line, "duplicate format line"));
                    }
                    let declared = tokens
                        .next()
                        .ok_or_else(|| FormatError::invalid_header(line, "format without encoding"))?;
                    let encoding = Encoding::from_str(declared).map_err(|_| {
                        FormatError::UnsupportedEncoding {
                            found: declared.to_owned(),
                        }
                    })?;
                    let version = tokens.next().unwrap_or("1.0").to_owned();
                    format = Some((encoding, version));
                }
                "comment" | "obj_info" => {
                    let rest = raw_line.trim_start()[keyword.len()..].trim();
                    comments.push(rest.to_owned());
                }
                "element" => {
                    let name = tokens
                        .next()
                        .ok_or_else(|| FormatError::invalid_header(line, "element without name"))?;
                    let count = tokens
                        .next()
                        .and_then(|count| count.parse::<u64>().ok())
                        .ok_or_else(|| {
                            FormatError::invalid_header(line, "element without a valid count")
                        })?;
                    elements.push(Element {
                        name: name.to_owned(),
                        count,
                        properties: Vec::new(),
                    });
                }
                "property" => {
                    let element = elements.last_mut().ok_or_else(|| {
                        FormatError::invalid_header(line, "property declared before any element")
                    })?;
                    let property = parse_property(line, &mut tokens)?;
                    element.properties.push(property);
                }
                "end_header" => break,
                other => {
                    return Err(FormatError::invalid_header(
                        line,
                        format!("unexpected keyword '{other}'"),
                    ));
                }
            }
        }

        let (encoding, version) = format.ok_or(FormatError::MissingFormat)?;

        Ok(Self {
            encoding,
            version,
            elements,
            comments,
            header_len,
        })
    }

    /// Looks up an element group by name.
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|element| element.name == name)
    }

    /// Byte regions of every element, in declaration order.
    ///
    /// A region is `None` once any earlier element (or the element itself)
    /// has a variable stride, since its position can no longer be computed
    /// from the header alone.
    pub fn element_regions(&self) -> Vec<Option<Region>> {
        let mut cursor = Some(self.header_len as u64);
        self.elements
            .iter()
            .map(|element| {
                let region = cursor
                    .zip(element.byte_len())
                    .map(|(offset, len)| Region { offset, len });
                cursor = region.and_then(|region| region.end());
                region
            })
            .collect()
    }

    /// Byte region of the named element, when computable.
    pub fn region_of(&self, name: &str) -> Option<Region> {
        let index = self.elements.iter().position(|element| element.name == name)?;
        self.element_regions().into_iter().nth(index).flatten()
    }
}

/// Returns the offset just past the `end_header` line terminator.
fn find_header_end(window: &[u8]) -> Option<usize> {
    let mut start = 0;
    while let Some(newline) = window[start..].iter().position(|&byte| byte == b'\n') {
        let end = start + newline;
        if window[start..end].trim_ascii() == END_HEADER {
            return Some(end + 1);
        }
        start = end + 1;
    }
    None
}

fn parse_property<'a>(
    line: usize,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Result<Property> {
    let scalar = |token: Option<&str>| -> Result<ScalarType> {
        let token = token.ok_or_else(|| FormatError::invalid_header(line, "property without type"))?;
        ScalarType::from_str(token).map_err(|_| {
            FormatError::invalid_header(line, format!("unknown property type '{token}'"))
        })
    };

    let first = tokens.next();
    let kind = if first == Some("list") {
        let count = scalar(tokens.next())?;
        let item = scalar(tokens.next())?;
        PropertyKind::List { count, item }
    } else {
        PropertyKind::Scalar(scalar(first)?)
    };

    let name = tokens
        .next()
        .ok_or_else(|| FormatError::invalid_header(line, "property without name"))?;

    Ok(Property {
        name: name.to_owned(),
        kind,
    })
}
