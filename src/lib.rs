//! Loader and runtime data model for Haneul byte files.
//!
//! A byte file is decoded by a [`Parser`] into a [`ByteFile`], which owns every function of the
//! program. Interpreters run functions through [`StackFrame`]s and keep structure instances in a
//! [`StructureHeap`].

#![deny(unused_must_use)]

pub mod byte_file;
pub mod config;
pub mod endian;
pub mod error;
pub mod frame;
pub mod function;
pub mod instruction;
pub mod parser;
pub mod reader;
pub mod string;
pub mod structure;
pub mod symbol;
mod utils;
pub mod value;
pub mod verify;
pub mod writer;

pub use byte_file::ByteFile;
pub use config::ParserConfig;
pub use endian::Endian;
pub use error::{Corruption, Error, Result};
pub use frame::StackFrame;
pub use function::{Function, FunctionId, FunctionInfo, FunctionInfoId, LineMap, Origin};
pub use instruction::{FreeVariable, Instruction, InstructionList, OpCode, Operand, VariableType};
pub use parser::{parse_bytes, parse_bytes_with, Parser};
pub use string::{StringList, StringMap};
pub use structure::{StructureHeap, StructureId};
pub use value::{Constant, ConstantList, Type};
pub use verify::{verify, VerifyErrorKind};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn model_is_shareable_across_threads() {
        assert_send_sync::<ByteFile>();
        assert_send_sync::<FunctionInfo>();
        assert_send_sync::<Function>();
        assert_send_sync::<StructureHeap>();
        assert_send_sync::<Error>();
    }
}
