use std::{fmt, ops::Index, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr as DeserializeRepr, Serialize_repr as SerializeRepr};

use crate::{
    error::{Error, Result},
    string::StringList,
};

/// Opcodes of the instruction set. The discriminants are the opcode bytes used in byte files.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, SerializeRepr, DeserializeRepr,
)]
#[repr(u8)]
pub enum OpCode {
    /// Push the constant at the operand index of the constant pool.
    Push,
    /// Discard the value at the top of the stack.
    Pop,
    /// Push the value of the local variable at the operand index.
    LoadLocal,
    /// Pop the top of the stack into the local variable at the operand index.
    StoreLocal,
    /// Push the captured free variable at the operand index of the running closure.
    LoadDeref,
    /// Pop the top of the stack into the global named at the operand index of the global list.
    StoreGlobal,
    /// Push the global named at the operand index of the global list.
    LoadGlobal,

    /// Call the function at the top of the stack, binding arguments by the operand's josa list.
    Call,
    /// Register a structure type with the operand's name and field list.
    AddStruct,
    /// Build a structure instance from the values on the stack, one per field in the operand.
    MakeStruct,
    /// Replace the structure at the top of the stack with its field named by the operand.
    GetField,
    /// Jump to the operand instruction index.
    Jmp,
    /// Pop a boolean, and jump to the operand instruction index if it is false.
    PopJmpIfFalse,
    /// Turn the function at the top of the stack into a closure capturing the operand's variables.
    FreeVar,

    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,

    Equal,
    LessThan,
    GreaterThan,
    Negate,
    LogicNot,
    LogicAnd,
    LogicOr,
}

impl OpCode {
    pub const COUNT: usize = 26;

    const ALL: [OpCode; Self::COUNT] = [
        Self::Push,
        Self::Pop,
        Self::LoadLocal,
        Self::StoreLocal,
        Self::LoadDeref,
        Self::StoreGlobal,
        Self::LoadGlobal,
        Self::Call,
        Self::AddStruct,
        Self::MakeStruct,
        Self::GetField,
        Self::Jmp,
        Self::PopJmpIfFalse,
        Self::FreeVar,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Mod,
        Self::Equal,
        Self::LessThan,
        Self::GreaterThan,
        Self::Negate,
        Self::LogicNot,
        Self::LogicAnd,
        Self::LogicOr,
    ];

    const MNEMONICS: [&'static str; Self::COUNT] = [
        "PUSH",
        "POP",
        "LOAD_LOCAL",
        "STORE_LOCAL",
        "LOAD_DEREF",
        "STORE_GLOBAL",
        "LOAD_GLOBAL",
        "CALL",
        "ADD_STRUCT",
        "MAKE_STRUCT",
        "GET_FIELD",
        "JMP",
        "POP_JMP_IF_FALSE",
        "FREE_VAR",
        "ADD",
        "SUBTRACT",
        "MULTIPLY",
        "DIVIDE",
        "MOD",
        "EQUAL",
        "LESS_THAN",
        "GREATER_THAN",
        "NEGATE",
        "LOGIC_NOT",
        "LOGIC_AND",
        "LOGIC_OR",
    ];

    #[inline(always)]
    pub const fn mnemonic(self) -> &'static str {
        Self::MNEMONICS[self as usize]
    }

    /// The shape of operand that always follows this opcode.
    pub const fn operand_kind(self) -> OperandKind {
        match self {
            Self::Push
            | Self::LoadLocal
            | Self::StoreLocal
            | Self::LoadDeref
            | Self::StoreGlobal
            | Self::LoadGlobal
            | Self::Jmp
            | Self::PopJmpIfFalse => OperandKind::Index,
            Self::FreeVar => OperandKind::FreeVariables,
            Self::Call => OperandKind::Josa,
            Self::AddStruct | Self::MakeStruct => OperandKind::Structure,
            Self::GetField => OperandKind::Field,
            Self::Pop
            | Self::Add
            | Self::Subtract
            | Self::Multiply
            | Self::Divide
            | Self::Mod
            | Self::Equal
            | Self::LessThan
            | Self::GreaterThan
            | Self::Negate
            | Self::LogicNot
            | Self::LogicAnd
            | Self::LogicOr => OperandKind::None,
        }
    }

    pub fn iter() -> impl Iterator<Item = OpCode> {
        Self::ALL.into_iter()
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied().ok_or(value)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Where a closure finds the value of one of its captured variables when it is created.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, SerializeRepr, DeserializeRepr,
)]
#[repr(u8)]
pub enum VariableType {
    /// A slot of the enclosing function's stack frame.
    Local = 0,
    /// One of the enclosing closure's own captured variables.
    Free = 1,
}

impl TryFrom<u8> for VariableType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Local),
            1 => Ok(Self::Free),
            _ => Err(value),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct FreeVariable {
    pub kind: VariableType,
    pub index: u8,
}

impl FreeVariable {
    pub const fn local(index: u8) -> Self {
        Self {
            kind: VariableType::Local,
            index,
        }
    }

    pub const fn free(index: u8) -> Self {
        Self {
            kind: VariableType::Free,
            index,
        }
    }
}

impl fmt::Display for FreeVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            VariableType::Local => write!(f, "local {}", self.index),
            VariableType::Free => write!(f, "free {}", self.index),
        }
    }
}

/// The variables a closure captures, in capture order. At most 255 entries.
pub type FreeVariableList = Vec<FreeVariable>;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum OperandKind {
    None,
    Index,
    FreeVariables,
    Josa,
    Structure,
    Field,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Operand {
    #[default]
    None,
    /// A constant, local, free variable, global or instruction index.
    Index(u32),
    FreeVariables(FreeVariableList),
    /// The josa list of a call site.
    Josa(StringList),
    /// A structure type name and its field names.
    Structure { name: Arc<str>, fields: StringList },
    /// A structure field name.
    Field(Arc<str>),
}

impl Operand {
    pub const fn kind(&self) -> OperandKind {
        match self {
            Self::None => OperandKind::None,
            Self::Index(_) => OperandKind::Index,
            Self::FreeVariables(_) => OperandKind::FreeVariables,
            Self::Josa(_) => OperandKind::Josa,
            Self::Structure { .. } => OperandKind::Structure,
            Self::Field(_) => OperandKind::Field,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Instruction {
    opcode: OpCode,
    operand: Operand,
}

impl Instruction {
    /// Pairs an opcode with its operand, failing if the operand has the wrong shape for the opcode.
    pub fn new(opcode: OpCode, operand: Operand) -> Result<Self> {
        if opcode.operand_kind() != operand.kind() {
            return Err(Error::OperandMismatch { opcode });
        }

        Ok(Self { opcode, operand })
    }

    /// Creates an instruction whose opcode takes an index operand.
    pub fn with_index(opcode: OpCode, index: u32) -> Result<Self> {
        Self::new(opcode, Operand::Index(index))
    }

    /// Creates an instruction whose opcode takes no operand.
    pub fn simple(opcode: OpCode) -> Result<Self> {
        Self::new(opcode, Operand::None)
    }

    #[inline(always)]
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    #[inline(always)]
    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    pub fn mnemonic(&self) -> &'static str {
        self.opcode.mnemonic()
    }

    /// The index operand, for opcodes that have one.
    pub fn index(&self) -> Option<u32> {
        match self.operand {
            Operand::Index(index) => Some(index),
            _ => None,
        }
    }
}

fn write_names<'a>(
    f: &mut fmt::Formatter<'_>,
    names: impl IntoIterator<Item = &'a Arc<str>>,
) -> fmt::Result {
    f.write_str("[")?;
    for (i, name) in names.into_iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(name)?;
    }
    f.write_str("]")
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())?;

        match &self.operand {
            Operand::None => Ok(()),
            Operand::Index(index) => write!(f, " {index}"),
            Operand::FreeVariables(vars) => {
                f.write_str(" [")?;
                for (i, var) in vars.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{var}")?;
                }
                f.write_str("]")
            }
            Operand::Josa(josa) => {
                f.write_str(" ")?;
                write_names(f, josa.iter())
            }
            Operand::Structure { name, fields } => {
                write!(f, " {name} ")?;
                write_names(f, fields.iter())
            }
            Operand::Field(name) => write!(f, " {name}"),
        }
    }
}

/// A function's code.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct InstructionList(Vec<Instruction>);

impl InstructionList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.0.push(instruction);
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.0.iter()
    }
}

impl Index<usize> for InstructionList {
    type Output = Instruction;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl FromIterator<Instruction> for InstructionList {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
