use thiserror::Error;
use tracing::debug;

use crate::{
    byte_file::ByteFile,
    error::{Error, Result},
    function::{FunctionId, FunctionInfo},
    instruction::{Operand, VariableType},
    value::Constant,
};

/// What [`verify`] found wrong with an instruction.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum VerifyErrorKind {
    #[error("constant {index} is out of range ({len} constants)")]
    ConstantOutOfRange { index: u32, len: usize },
    #[error("local {index} is out of range ({len} locals)")]
    LocalOutOfRange { index: u32, len: u32 },
    #[error("global {index} is out of range ({len} globals)")]
    GlobalOutOfRange { index: u32, len: usize },
    #[error("jump target {target} is past the end of the code ({len} instructions)")]
    JumpOutOfRange { target: u32, len: usize },
    #[error("pushed function #{} is not registered", .0.index())]
    MissingFunction(FunctionId),
    #[error("line map record for instruction {0} is out of order")]
    UnsortedLineMap(u32),
}

/// Checks that every operand of every function in `file` refers to something that exists.
///
/// Parsing only checks that a byte file is well formed. This catches byte files that are well
/// formed but would make an interpreter index out of bounds.
pub fn verify(file: &ByteFile) -> Result<()> {
    for (_, info) in file.infos() {
        verify_function(file, info)?;
    }

    debug!(functions = file.info_count(), "byte file verified");
    Ok(())
}

/// Checks a single function descriptor against the byte file that owns it.
pub fn verify_function(file: &ByteFile, info: &FunctionInfo) -> Result<()> {
    use crate::instruction::OpCode::*;

    let fail = |offset: usize, kind| Error::Verify {
        function: info.name.clone(),
        offset,
        kind,
    };

    let mut previous = 0;
    for (offset, _) in info.line_map.iter() {
        if offset < previous {
            return Err(fail(offset as usize, VerifyErrorKind::UnsortedLineMap(offset)));
        }
        previous = offset;
    }

    let code_len = info.instruction_list.len();
    let locals = info.local_variable_count;

    for (offset, instruction) in info.instruction_list.iter().enumerate() {
        let kind = match (instruction.opcode(), instruction.operand()) {
            (Push, &Operand::Index(index)) => match info.constant_list.get(index as usize) {
                None => Some(VerifyErrorKind::ConstantOutOfRange {
                    index,
                    len: info.constant_list.len(),
                }),
                Some(Constant::Function(id)) if file.function(id).is_none() => {
                    Some(VerifyErrorKind::MissingFunction(id))
                }
                Some(_) => None,
            },
            (LoadLocal | StoreLocal, &Operand::Index(index)) if index >= locals => {
                Some(VerifyErrorKind::LocalOutOfRange { index, len: locals })
            }
            (LoadGlobal | StoreGlobal, &Operand::Index(index))
                if index as usize >= info.global_list.len() =>
            {
                Some(VerifyErrorKind::GlobalOutOfRange {
                    index,
                    len: info.global_list.len(),
                })
            }
            // Jumping to the end of the code returns from the function.
            (Jmp | PopJmpIfFalse, &Operand::Index(target)) if target as usize > code_len => {
                Some(VerifyErrorKind::JumpOutOfRange {
                    target,
                    len: code_len,
                })
            }
            (FreeVar, Operand::FreeVariables(variables)) => variables
                .iter()
                .find(|var| var.kind == VariableType::Local && var.index as u32 >= locals)
                .map(|var| VerifyErrorKind::LocalOutOfRange {
                    index: var.index as u32,
                    len: locals,
                }),
            _ => None,
        };

        if let Some(kind) = kind {
            return Err(fail(offset, kind));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{FreeVariable, Instruction, OpCode};

    fn single(info: FunctionInfo) -> ByteFile {
        let mut file = ByteFile::new();
        let id = file.register_function(info);
        file.set_root(id).unwrap();
        file
    }

    fn with_code(locals: u32, code: impl IntoIterator<Item = Instruction>) -> FunctionInfo {
        let mut info = FunctionInfo::new("검사");
        info.local_variable_count = locals;
        info.instruction_list = code.into_iter().collect();
        info
    }

    fn kind_of(result: Result<()>) -> (usize, VerifyErrorKind) {
        match result {
            Err(Error::Verify { offset, kind, .. }) => (offset, kind),
            other => panic!("expected a verify error, got {other:?}"),
        }
    }

    fn index(opcode: OpCode, index: u32) -> Instruction {
        Instruction::with_index(opcode, index).unwrap()
    }

    #[test]
    fn well_formed_function_passes() {
        let mut info = with_code(
            1,
            [
                index(OpCode::Push, 0),
                index(OpCode::StoreLocal, 0),
                index(OpCode::LoadLocal, 0),
                index(OpCode::StoreGlobal, 0),
                index(OpCode::Jmp, 5),
                Instruction::simple(OpCode::Pop).unwrap(),
            ],
        );
        info.constant_list.push(1i64);
        info.global_list.push("전역".into());
        info.line_map.add_line(0, 1);
        info.line_map.add_line(3, 2);

        verify(&single(info)).unwrap();
    }

    #[test]
    fn out_of_range_operands_are_reported() {
        let file = single(with_code(0, [index(OpCode::Push, 0)]));
        assert_eq!(
            kind_of(verify(&file)),
            (0, VerifyErrorKind::ConstantOutOfRange { index: 0, len: 0 })
        );

        let file = single(with_code(
            2,
            [index(OpCode::LoadLocal, 1), index(OpCode::StoreLocal, 2)],
        ));
        assert_eq!(
            kind_of(verify(&file)),
            (1, VerifyErrorKind::LocalOutOfRange { index: 2, len: 2 })
        );

        let file = single(with_code(0, [index(OpCode::LoadGlobal, 0)]));
        assert_eq!(
            kind_of(verify(&file)).1,
            VerifyErrorKind::GlobalOutOfRange { index: 0, len: 0 }
        );

        let file = single(with_code(0, [index(OpCode::PopJmpIfFalse, 2)]));
        assert_eq!(
            kind_of(verify(&file)).1,
            VerifyErrorKind::JumpOutOfRange { target: 2, len: 1 }
        );

        let free_var = Instruction::new(
            OpCode::FreeVar,
            Operand::FreeVariables(vec![FreeVariable::free(9), FreeVariable::local(1)]),
        )
        .unwrap();
        let file = single(with_code(1, [free_var]));
        assert_eq!(
            kind_of(verify(&file)).1,
            VerifyErrorKind::LocalOutOfRange { index: 1, len: 1 }
        );
    }

    #[test]
    fn pushed_functions_must_exist() {
        let mut info = with_code(0, [index(OpCode::Push, 0)]);
        info.constant_list.push(FunctionId::new(3));

        assert_eq!(
            kind_of(verify(&single(info))).1,
            VerifyErrorKind::MissingFunction(FunctionId::new(3))
        );
    }

    #[test]
    fn line_map_must_be_sorted() {
        let mut info = with_code(0, []);
        info.line_map.add_line(4, 1);
        info.line_map.add_line(1, 2);

        let err = verify(&single(info)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid function `검사` at instruction 1: line map record for instruction 1 is out of order"
        );
    }
}
