use std::{io, path::PathBuf, sync::Arc};

use thiserror::Error;

use crate::{
    function::FunctionId, instruction::OpCode, instruction::VariableType, value::Type,
    verify::VerifyErrorKind,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read byte file `{}`: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("short read from `{}`: expected {expected} bytes, got {actual}", .path.display())]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    #[error("no byte file has been loaded")]
    NotLoaded,
    #[error("corrupt byte file at offset {offset}: {kind}")]
    CorruptByteFile { offset: usize, kind: Corruption },
    #[error("invalid opcode {value:#04x} at offset {offset}")]
    InvalidOpCode { offset: usize, value: u8 },
    #[error("operand does not match opcode `{}`", .opcode.mnemonic())]
    OperandMismatch { opcode: OpCode },
    #[error("string list is full (255 entries)")]
    StringListFull,
    #[error("the byte file already has a root function")]
    RootAlreadySet,
    #[error("the byte file has no root function")]
    NoRoot,
    #[error("function #{} is not registered in this byte file", .0.index())]
    UnknownFunction(FunctionId),
    #[error("string of {len} bytes does not fit a {max}-byte length prefix")]
    StringTooLong { len: usize, max: usize },
    #[error("{what} list of {len} entries does not fit a 255-entry count")]
    ListTooLong { what: &'static str, len: usize },
    #[error("function #{} contains itself as a constant", .0.index())]
    RecursiveFunction(FunctionId),
    #[error("constants of type `{0}` cannot be written to a byte file")]
    UnserializableConstant(Type),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("type mismatch: expected `{expected}`, found `{actual}`")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("cannot capture {kind:?} variable {index}: only {available} available")]
    CaptureOutOfRange {
        kind: VariableType,
        index: u8,
        available: usize,
    },
    #[error("invalid function `{function}` at instruction {offset}: {kind}")]
    Verify {
        function: Arc<str>,
        offset: usize,
        kind: VerifyErrorKind,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] ron::error::SpannedError),
}

impl Error {
    pub(crate) fn corrupt(offset: usize, kind: Corruption) -> Self {
        Self::CorruptByteFile { offset, kind }
    }

    /// Whether this error was caused by malformed byte file contents, as opposed to I/O or API
    /// misuse.
    pub fn is_corrupt(&self) -> bool {
        matches!(
            self,
            Self::CorruptByteFile { .. } | Self::InvalidOpCode { .. }
        )
    }
}

/// The ways in which byte file contents can be inconsistent with the format.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum Corruption {
    #[error("unexpected end of file: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("{what} count {count} exceeds the {remaining} remaining bytes")]
    CountOverflow {
        what: &'static str,
        count: u64,
        remaining: usize,
    },
    #[error("invalid type tag {0:#04x}")]
    InvalidType(u8),
    #[error("invalid variable type {0:#04x}")]
    InvalidVariableType(u8),
    #[error("invalid boolean {0:#04x}")]
    InvalidBoolean(u8),
    #[error("invalid utf-8 sequence")]
    InvalidUtf8,
    #[error("{0:#x} is not a unicode scalar value")]
    InvalidCharacter(u32),
    #[error("structures cannot appear in a constant pool")]
    StructureConstant,
    #[error("functions nested deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("stack operand count {0} is too large")]
    StackTooLarge(u64),
    #[error("{0} trailing bytes after the root function")]
    TrailingBytes(usize),
}
