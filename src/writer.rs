use std::io;

use paste::paste;

use crate::{
    byte_file::ByteFile,
    endian::Endian,
    error::{Error, Result},
    function::{FunctionId, FunctionInfoId, LineEntry},
    instruction::{Instruction, Operand},
    string::StringList,
    value::Constant,
};

/// Generates a `write_<ty>` method that encodes one fixed-width scalar in the writer's byte order.
macro_rules! write_scalars {
    ($($t:ty),* $(,)?) => {
        paste! {
            $(
                #[inline]
                pub fn [<write_ $t>](&mut self, value: $t) -> Result<()> {
                    match self.endian {
                        Endian::Little => self.writer.write_all(&value.to_le_bytes())?,
                        Endian::Big => self.writer.write_all(&value.to_be_bytes())?,
                    }
                    Ok(())
                }
            )*
        }
    };
}

/// Encodes the primitives of the byte file format.
pub struct ByteWriter<W> {
    writer: W,
    endian: Endian,
}

impl<W: io::Write> ByteWriter<W> {
    pub fn new(writer: W, endian: Endian) -> Self {
        Self { writer, endian }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    write_scalars!(u8, u16, u32, u64, i64, f64);

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(value as u8)
    }

    /// Writes a string with a `u64` length prefix.
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_u64(s.len() as u64)?;
        self.writer.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Writes a string with a `u8` length prefix.
    pub fn write_short_string(&mut self, s: &str) -> Result<()> {
        let len = u8::try_from(s.len()).map_err(|_| Error::StringTooLong {
            len: s.len(),
            max: u8::MAX as usize,
        })?;

        self.write_u8(len)?;
        self.writer.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn write_character(&mut self, c: char) -> Result<()> {
        let mut buf = [0; 4];
        self.writer.write_all(c.encode_utf8(&mut buf).as_bytes())?;
        Ok(())
    }

    pub fn write_string_list(&mut self, list: &StringList) -> Result<()> {
        self.write_u8(list.len())?;
        for s in list.iter() {
            self.write_short_string(s)?;
        }
        Ok(())
    }
}

impl ByteFile {
    /// Encodes the root function, and every function reachable from its constants, in the byte
    /// file format.
    pub fn to_bytes(&self, endian: Endian) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes, endian)?;
        Ok(bytes)
    }

    pub fn write_to(&self, writer: impl io::Write, endian: Endian) -> Result<()> {
        let root = self.root_id().ok_or(Error::NoRoot)?;

        Encoder {
            writer: ByteWriter::new(writer, endian),
            file: self,
            open: Vec::new(),
        }
        .function(root)
    }
}

struct Encoder<'f, W> {
    writer: ByteWriter<W>,
    file: &'f ByteFile,
    /// Descriptors whose records are being written, outermost first.
    open: Vec<FunctionInfoId>,
}

impl<'f, W: io::Write> Encoder<'f, W> {
    fn function(&mut self, id: FunctionId) -> Result<()> {
        let info_id = self
            .file
            .function(id)
            .ok_or(Error::UnknownFunction(id))?
            .info();
        let info = self.file.info(info_id).ok_or(Error::UnknownFunction(id))?;

        if self.open.contains(&info_id) {
            return Err(Error::RecursiveFunction(id));
        }
        self.open.push(info_id);

        self.writer.write_string_list(&info.josa_list)?;

        self.writer.write_u64(info.global_list.len() as u64)?;
        for global in &info.global_list {
            self.writer.write_string(global)?;
        }

        self.writer.write_u64(info.stack_operand_count)?;
        self.writer.write_u32(info.local_variable_count)?;

        self.writer.write_u64(info.constant_list.len() as u64)?;
        for &constant in info.constant_list.iter() {
            self.constant(constant)?;
        }

        self.writer.write_string(&info.name)?;
        self.writer.write_string(&info.origin.path)?;
        self.writer.write_u16(info.origin.line)?;

        self.writer.write_u64(info.line_map.len() as u64)?;
        for (offset, entry) in info.line_map.iter() {
            self.writer.write_u32(offset)?;
            match entry {
                LineEntry::Line(line) => {
                    self.writer.write_bool(true)?;
                    self.writer.write_u16(*line)?;
                }
                LineEntry::Path(path) => {
                    self.writer.write_bool(false)?;
                    self.writer.write_string(path)?;
                }
            }
        }

        self.writer.write_u64(info.instruction_list.len() as u64)?;
        for instruction in info.instruction_list.iter() {
            self.instruction(instruction)?;
        }

        self.open.pop();
        Ok(())
    }

    fn constant(&mut self, constant: Constant) -> Result<()> {
        self.writer.write_u8(constant.get_type() as u8)?;

        match constant {
            Constant::None => Ok(()),
            Constant::Integer(value) => self.writer.write_i64(value),
            Constant::Real(value) => self.writer.write_f64(value),
            Constant::Boolean(value) => self.writer.write_bool(value),
            Constant::Character(value) => self.writer.write_character(value),
            Constant::Function(id) => self.function(id),
            Constant::Structure(_) => Err(Error::UnserializableConstant(constant.get_type())),
        }
    }

    fn instruction(&mut self, instruction: &Instruction) -> Result<()> {
        self.writer.write_u8(instruction.opcode() as u8)?;

        match instruction.operand() {
            Operand::None => Ok(()),
            Operand::Index(index) => self.writer.write_u32(*index),
            Operand::FreeVariables(variables) => {
                let len = u8::try_from(variables.len()).map_err(|_| Error::ListTooLong {
                    what: "free variable",
                    len: variables.len(),
                })?;

                self.writer.write_u8(len)?;
                for var in variables {
                    self.writer.write_u8(var.kind as u8)?;
                    self.writer.write_u8(var.index)?;
                }
                Ok(())
            }
            Operand::Josa(josa) => self.writer.write_string_list(josa),
            Operand::Structure { name, fields } => {
                self.writer.write_short_string(name)?;
                self.writer.write_string_list(fields)
            }
            Operand::Field(name) => self.writer.write_short_string(name),
        }
    }
}
