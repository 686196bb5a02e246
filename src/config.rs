use serde::{Deserialize, Serialize};

use crate::{endian::Endian, error::Result};

/// Limits and format options applied while parsing a byte file.
///
/// Every field has a default, so a RON document only needs to name the fields it changes:
///
/// ```
/// # use haneul_vm::{Endian, ParserConfig};
/// let config = ParserConfig::from_ron_str("(endian: Big, max_depth: 8)").unwrap();
/// assert_eq!(config.endian, Endian::Big);
/// assert_eq!(config.max_depth, 8);
/// assert!(!config.reject_trailing_bytes);
/// ```
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Byte order of every multi-byte scalar.
    pub endian: Endian,
    /// How deep function constants may nest inside each other.
    pub max_depth: usize,
    /// The largest stack operand count a function may declare. Unlimited by default.
    pub max_stack_operands: u64,
    /// Fail instead of warning when bytes follow the root function.
    pub reject_trailing_bytes: bool,
}

impl ParserConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 256;
    pub const DEFAULT_MAX_STACK_OPERANDS: u64 = u64::MAX;

    pub fn from_ron_str(s: &str) -> Result<Self> {
        Ok(ron::from_str(s)?)
    }

    pub fn to_ron_string(&self) -> std::result::Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            endian: Endian::Little,
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_stack_operands: Self::DEFAULT_MAX_STACK_OPERANDS,
            reject_trailing_bytes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(ParserConfig::from_ron_str("()").unwrap(), ParserConfig::default());
    }

    #[test]
    fn pretty_output_reads_back() {
        let config = ParserConfig {
            endian: Endian::Big,
            reject_trailing_bytes: true,
            ..Default::default()
        };

        let text = config.to_ron_string().unwrap();
        assert_eq!(ParserConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = ParserConfig::from_ron_str("(max_depth: \"deep\")").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
