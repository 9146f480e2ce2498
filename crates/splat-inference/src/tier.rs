//! GPU tiers offered by the inference backend.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// GPU class the backend should run a generation on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumIter, EnumString, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GpuTier {
    T4,
    L4,
    #[default]
    A10,
    A100,
    H100,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_wire_names() {
        let names: Vec<&str> = GpuTier::iter().map(Into::into).collect();
        assert_eq!(names, ["t4", "l4", "a10", "a100", "h100"]);
        assert_eq!(
            serde_json::to_string(&GpuTier::H100).unwrap(),
            "\"h100\""
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(GpuTier::from_str("A100").unwrap(), GpuTier::A100);
        assert!(GpuTier::from_str("v100").is_err());
        assert_eq!(GpuTier::default(), GpuTier::A10);
    }
}
