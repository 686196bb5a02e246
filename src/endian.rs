use serde::{Deserialize, Serialize};

/// Byte order of multi-byte scalars in a byte file.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Endian {
    /// Least significant byte first. Byte files are written this way unless configured otherwise.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}
