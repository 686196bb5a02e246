use std::{fmt, ops::Index};

use const_format::concatcp;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr as DeserializeRepr, Serialize_repr as SerializeRepr};

use crate::{
    error::{Error, Result},
    function::FunctionId,
    structure::StructureId,
};

/// The runtime type tag of a [`Constant`]. The discriminants are the tag bytes used in byte files.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, SerializeRepr, DeserializeRepr,
)]
#[repr(u8)]
pub enum Type {
    None = 0,
    Integer = 1,
    Real = 2,
    Boolean = 3,
    Character = 4,
    Function = 5,
    Structure = 6,
}

impl Type {
    pub const NONE_NAME: &'static str = "없음";
    pub const INTEGER_NAME: &'static str = "정수";
    pub const REAL_NAME: &'static str = "실수";
    pub const BOOLEAN_NAME: &'static str = "부울";
    pub const CHARACTER_NAME: &'static str = "문자";
    pub const FUNCTION_NAME: &'static str = "함수";
    pub const STRUCTURE_NAME: &'static str = "구조체";

    /// Expected-type string for operations accepting either numeric type.
    pub const NUMBER_NAME: &'static str = concatcp!(Type::INTEGER_NAME, " | ", Type::REAL_NAME);

    pub const fn name(self) -> &'static str {
        match self {
            Self::None => Self::NONE_NAME,
            Self::Integer => Self::INTEGER_NAME,
            Self::Real => Self::REAL_NAME,
            Self::Boolean => Self::BOOLEAN_NAME,
            Self::Character => Self::CHARACTER_NAME,
            Self::Function => Self::FUNCTION_NAME,
            Self::Structure => Self::STRUCTURE_NAME,
        }
    }
}

impl TryFrom<u8> for Type {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::None,
            1 => Self::Integer,
            2 => Self::Real,
            3 => Self::Boolean,
            4 => Self::Character,
            5 => Self::Function,
            6 => Self::Structure,
            _ => return Err(value),
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamically typed value.
///
/// Function and structure values are references into the arenas that own them
/// ([`ByteFile`](crate::ByteFile) and [`StructureHeap`](crate::StructureHeap)), so copying a
/// constant never copies the referenced object.
#[derive(Copy, Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub enum Constant {
    /// The absence of a value. Also the contents of a stack slot that was never written.
    #[default]
    None,
    /// A signed 64-bit integer.
    Integer(i64),
    /// A double precision IEEE 754 floating point value.
    Real(f64),
    /// A boolean value which can be true or false.
    Boolean(bool),
    /// A single Unicode scalar value.
    Character(char),
    /// A reference to a runtime function (possibly a closure) owned by a byte file.
    Function(FunctionId),
    /// A reference to a structure instance owned by a structure heap.
    Structure(StructureId),
}

impl Constant {
    #[inline(always)]
    pub const fn get_type(&self) -> Type {
        match self {
            Self::None => Type::None,
            Self::Integer(_) => Type::Integer,
            Self::Real(_) => Type::Real,
            Self::Boolean(_) => Type::Boolean,
            Self::Character(_) => Type::Character,
            Self::Function(_) => Type::Function,
            Self::Structure(_) => Type::Structure,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn integer_or<E>(self, err: E) -> std::result::Result<i64, E> {
        match self {
            Self::Integer(v) => Ok(v),
            _ => Err(err),
        }
    }

    pub fn real_or<E>(self, err: E) -> std::result::Result<f64, E> {
        match self {
            Self::Real(v) => Ok(v),
            _ => Err(err),
        }
    }

    pub fn boolean_or<E>(self, err: E) -> std::result::Result<bool, E> {
        match self {
            Self::Boolean(v) => Ok(v),
            _ => Err(err),
        }
    }

    pub fn character_or<E>(self, err: E) -> std::result::Result<char, E> {
        match self {
            Self::Character(v) => Ok(v),
            _ => Err(err),
        }
    }

    pub fn function_or<E>(self, err: E) -> std::result::Result<FunctionId, E> {
        match self {
            Self::Function(v) => Ok(v),
            _ => Err(err),
        }
    }

    pub fn structure_or<E>(self, err: E) -> std::result::Result<StructureId, E> {
        match self {
            Self::Structure(v) => Ok(v),
            _ => Err(err),
        }
    }

    /// Returns `self` if it has type `expected`, or a type mismatch error otherwise. Used by the
    /// dispatcher for operand checks that must fail rather than coerce.
    pub fn expect_type(self, expected: Type) -> Result<Self> {
        if self.get_type() == expected {
            Ok(self)
        } else {
            Err(Error::TypeMismatch {
                expected: expected.name(),
                actual: self.get_type().name(),
            })
        }
    }

    /// Returns `self` if it is an integer or a real.
    pub fn expect_number(self) -> Result<Self> {
        match self {
            Self::Integer(_) | Self::Real(_) => Ok(self),
            _ => Err(Error::TypeMismatch {
                expected: Type::NUMBER_NAME,
                actual: self.get_type().name(),
            }),
        }
    }
}

impl From<i64> for Constant {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Constant {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Constant {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<char> for Constant {
    fn from(value: char) -> Self {
        Self::Character(value)
    }
}

impl From<FunctionId> for Constant {
    fn from(value: FunctionId) -> Self {
        Self::Function(value)
    }
}

impl From<StructureId> for Constant {
    fn from(value: StructureId) -> Self {
        Self::Structure(value)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str(Type::NONE_NAME),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v:?}"),
            Self::Boolean(true) => f.write_str("참"),
            Self::Boolean(false) => f.write_str("거짓"),
            Self::Character(v) => write!(f, "{v:?}"),
            Self::Function(id) => write!(f, "<{} #{}>", Type::FUNCTION_NAME, id.index()),
            Self::Structure(id) => write!(f, "<{} #{}>", Type::STRUCTURE_NAME, id.index()),
        }
    }
}

/// A function's constant pool. Built once while parsing and never modified afterwards.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ConstantList(Vec<Constant>);

impl ConstantList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, constant: impl Into<Constant>) {
        self.0.push(constant.into());
    }

    /// Returns a copy of the constant at `index`.
    pub fn get(&self, index: usize) -> Option<Constant> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Constant] {
        &self.0
    }
}

impl Index<usize> for ConstantList {
    type Output = Constant;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl FromIterator<Constant> for ConstantList {
    fn from_iter<T: IntoIterator<Item = Constant>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_match_variants() {
        let cases = [
            (Constant::None, Type::None),
            (Constant::Integer(-3), Type::Integer),
            (Constant::Real(1.5), Type::Real),
            (Constant::Boolean(true), Type::Boolean),
            (Constant::Character('가'), Type::Character),
            (Constant::Function(FunctionId::new(0)), Type::Function),
            (Constant::Structure(StructureId::new(0)), Type::Structure),
        ];

        for (constant, ty) in cases {
            assert_eq!(constant.get_type(), ty);
            assert_eq!(Type::try_from(ty as u8), Ok(ty));
        }
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        assert_eq!(Type::try_from(7), Err(7));
        assert_eq!(Type::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn accessors_do_not_coerce() {
        assert_eq!(Constant::Integer(4).integer_or(()), Ok(4));
        assert_eq!(Constant::Real(4.0).integer_or(()), Err(()));
        assert_eq!(Constant::Boolean(false).boolean_or("bool"), Ok(false));
        assert_eq!(Constant::None.character_or("char"), Err("char"));
    }

    #[test]
    fn type_mismatch_reports_names() {
        let err = Constant::Boolean(true).expect_number().unwrap_err();

        match err {
            Error::TypeMismatch { expected, actual } => {
                assert_eq!(expected, "정수 | 실수");
                assert_eq!(actual, Type::BOOLEAN_NAME);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(Constant::Real(0.5).expect_type(Type::Real).is_ok());
        assert!(Constant::Real(0.5).expect_type(Type::Integer).is_err());
    }

    #[test]
    fn copies_share_references() {
        let original = Constant::Function(FunctionId::new(3));
        let copy = original;

        assert_eq!(original, copy);
        assert_eq!(copy.function_or(()), Ok(FunctionId::new(3)));
    }
}
