use std::{
    fs::File,
    io::{self, Read},
    mem,
    path::Path,
    sync::Arc,
};

use tracing::{debug, trace, warn};

use crate::{
    byte_file::ByteFile,
    config::ParserConfig,
    error::{Corruption, Error, Result},
    function::{FunctionId, FunctionInfo, LineMap, Origin},
    instruction::{
        FreeVariable, FreeVariableList, Instruction, InstructionList, OpCode, Operand,
        OperandKind, VariableType,
    },
    reader::ByteReader,
    string::StringList,
    symbol::Symbols,
    utils::saturating_usize,
    value::{Constant, ConstantList, Type},
};

/// Smallest encoded line map record: offset, kind flag, and a line number.
const MIN_LINE_ENTRY_SIZE: usize = 4 + 1 + 2;
/// Smallest encoded global name: an empty string's length prefix.
const MIN_GLOBAL_SIZE: usize = 8;

/// Loads byte files into memory and decodes them into a [`ByteFile`].
///
/// ```no_run
/// # fn main() -> haneul_vm::Result<()> {
/// let mut parser = haneul_vm::Parser::new();
/// parser.load("main.hnc")?;
/// parser.parse()?;
/// let program = parser.take_result();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Parser {
    bytes: Option<Vec<u8>>,
    config: ParserConfig,
    result: ByteFile,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            bytes: None,
            config,
            result: ByteFile::new(),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Reads the whole file at `path` into memory. On failure, whatever was loaded before stays
    /// loaded.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let unreadable = |source: io::Error| Error::FileUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(unreadable)?;
        let expected = file.metadata().map_err(unreadable)?.len();
        let bytes = read_all(path, file, expected)?;

        debug!(path = %path.display(), len = bytes.len(), "byte file loaded");
        self.load_bytes(bytes);
        Ok(())
    }

    /// Replaces the loaded bytes and drops any previous result.
    pub fn load_bytes(&mut self, bytes: impl Into<Vec<u8>>) {
        self.bytes = Some(bytes.into());
        self.result.clear();
    }

    pub fn is_loaded(&self) -> bool {
        self.bytes.is_some()
    }

    /// Decodes the loaded bytes from the start. On failure the result is left empty.
    pub fn parse(&mut self) -> Result<()> {
        let bytes = self.bytes.as_deref().ok_or(Error::NotLoaded)?;

        self.result.clear();
        self.result = parse_bytes_with(bytes, &self.config)?;
        Ok(())
    }

    pub fn result(&self) -> &ByteFile {
        &self.result
    }

    /// Moves the parsed byte file out, leaving an empty one behind.
    pub fn take_result(&mut self) -> ByteFile {
        mem::take(&mut self.result)
    }
}

/// Reads `source` to the end, failing if it yields fewer than the `expected` bytes its metadata
/// announced.
fn read_all(path: &Path, mut source: impl Read, expected: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(saturating_usize(expected));
    source
        .read_to_end(&mut bytes)
        .map_err(|source| Error::FileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let actual = bytes.len() as u64;
    if actual < expected {
        return Err(Error::ShortRead {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }

    Ok(bytes)
}

/// Decodes a byte file with the default configuration.
pub fn parse_bytes(bytes: &[u8]) -> Result<ByteFile> {
    parse_bytes_with(bytes, &ParserConfig::default())
}

pub fn parse_bytes_with(bytes: &[u8], config: &ParserConfig) -> Result<ByteFile> {
    let mut decoder = Decoder::new(bytes, config);

    let root = decoder.function()?;
    decoder.file.set_root(root)?;

    let trailing = decoder.reader.remaining();
    if trailing > 0 {
        let offset = decoder.reader.position();

        if config.reject_trailing_bytes {
            return Err(Error::corrupt(offset, Corruption::TrailingBytes(trailing)));
        }
        warn!(offset, trailing, "ignoring trailing bytes after the root function");
    }

    debug!(
        functions = decoder.file.info_count(),
        symbols = decoder.symbols.len(),
        len = bytes.len(),
        "byte file parsed"
    );
    Ok(decoder.file)
}

/// The state of one decoding pass.
struct Decoder<'a, 'c> {
    reader: ByteReader<'a>,
    config: &'c ParserConfig,
    file: ByteFile,
    symbols: Symbols,
    depth: usize,
}

impl<'a, 'c> Decoder<'a, 'c> {
    fn new(bytes: &'a [u8], config: &'c ParserConfig) -> Self {
        Self {
            reader: ByteReader::new(bytes, config.endian),
            config,
            file: ByteFile::new(),
            symbols: Symbols::new(),
            depth: 0,
        }
    }

    fn string(&mut self) -> Result<Arc<str>> {
        let s = self.reader.read_string()?;
        Ok(self.symbols.intern(s))
    }

    fn short_string(&mut self) -> Result<Arc<str>> {
        let s = self.reader.read_short_string()?;
        Ok(self.symbols.intern(s))
    }

    /// Decodes a function record and registers it, after any functions nested in it.
    fn function(&mut self) -> Result<FunctionId> {
        if self.depth > self.config.max_depth {
            return Err(Error::corrupt(
                self.reader.position(),
                Corruption::NestingTooDeep(self.config.max_depth),
            ));
        }

        self.depth += 1;
        let info = self.function_info();
        self.depth -= 1;

        Ok(self.file.register_function(info?))
    }

    fn function_info(&mut self) -> Result<FunctionInfo> {
        let start = self.reader.position();

        let josa_list = self.string_list()?;
        let global_list = self.global_list()?;

        let offset = self.reader.position();
        let stack_operand_count = self.reader.read_u64()?;
        if stack_operand_count > self.config.max_stack_operands {
            return Err(Error::corrupt(
                offset,
                Corruption::StackTooLarge(stack_operand_count),
            ));
        }

        let local_variable_count = self.reader.read_u32()?;
        let constant_list = self.constant_list()?;

        let name = self.string()?;
        let origin = Origin {
            path: self.string()?,
            line: self.reader.read_u16()?,
        };

        let line_map = self.line_map()?;
        let instruction_list = self.instruction_list()?;

        trace!(
            %name,
            start,
            end = self.reader.position(),
            constants = constant_list.len(),
            instructions = instruction_list.len(),
            "function decoded"
        );

        Ok(FunctionInfo {
            name,
            origin,
            josa_list,
            global_list,
            stack_operand_count,
            local_variable_count,
            constant_list,
            line_map,
            instruction_list,
        })
    }

    fn string_list(&mut self) -> Result<StringList> {
        let count = self.reader.read_short_count("string list", 1)?;
        let mut list = StringList::with_capacity(count as u8);

        for _ in 0..count {
            let s = self.short_string()?;
            list.push(s)?;
        }

        Ok(list)
    }

    fn global_list(&mut self) -> Result<Vec<Arc<str>>> {
        let count = self.reader.read_count("global", MIN_GLOBAL_SIZE)?;
        let mut globals = Vec::with_capacity(count);

        for _ in 0..count {
            globals.push(self.string()?);
        }

        Ok(globals)
    }

    fn constant_list(&mut self) -> Result<ConstantList> {
        let count = self.reader.read_count("constant", 1)?;
        let mut constants = ConstantList::with_capacity(count);

        for _ in 0..count {
            constants.push(self.constant()?);
        }

        Ok(constants)
    }

    fn constant(&mut self) -> Result<Constant> {
        let offset = self.reader.position();
        let tag = self.reader.read_u8()?;
        let ty = Type::try_from(tag)
            .map_err(|tag| Error::corrupt(offset, Corruption::InvalidType(tag)))?;

        let constant = match ty {
            Type::None => Constant::None,
            Type::Integer => Constant::Integer(self.reader.read_i64()?),
            Type::Real => Constant::Real(self.reader.read_f64()?),
            Type::Boolean => Constant::Boolean(self.reader.read_bool()?),
            Type::Character => Constant::Character(self.reader.read_character()?),
            Type::Function => Constant::Function(self.function()?),
            Type::Structure => {
                return Err(Error::corrupt(offset, Corruption::StructureConstant));
            }
        };

        Ok(constant)
    }

    fn line_map(&mut self) -> Result<LineMap> {
        let count = self.reader.read_count("line map entry", MIN_LINE_ENTRY_SIZE)?;
        let mut map = LineMap::with_capacity(count);

        for _ in 0..count {
            let offset = self.reader.read_u32()?;

            if self.reader.read_bool()? {
                map.add_line(offset, self.reader.read_u16()?);
            } else {
                let path = self.string()?;
                map.add_path(offset, path);
            }
        }

        Ok(map)
    }

    fn instruction_list(&mut self) -> Result<InstructionList> {
        let count = self.reader.read_count("instruction", 1)?;
        let mut instructions = InstructionList::with_capacity(count);

        for _ in 0..count {
            instructions.push(self.instruction()?);
        }

        Ok(instructions)
    }

    fn instruction(&mut self) -> Result<Instruction> {
        let offset = self.reader.position();
        let opcode = OpCode::try_from(self.reader.read_u8()?)
            .map_err(|value| Error::InvalidOpCode { offset, value })?;

        let operand = match opcode.operand_kind() {
            OperandKind::None => Operand::None,
            OperandKind::Index => Operand::Index(self.reader.read_u32()?),
            OperandKind::FreeVariables => Operand::FreeVariables(self.free_variable_list()?),
            OperandKind::Josa => Operand::Josa(self.string_list()?),
            OperandKind::Structure => Operand::Structure {
                name: self.short_string()?,
                fields: self.string_list()?,
            },
            OperandKind::Field => Operand::Field(self.short_string()?),
        };

        Instruction::new(opcode, operand)
    }

    fn free_variable_list(&mut self) -> Result<FreeVariableList> {
        let count = self.reader.read_short_count("free variable", 2)?;
        let mut variables = FreeVariableList::with_capacity(count);

        for _ in 0..count {
            let offset = self.reader.position();
            let kind = VariableType::try_from(self.reader.read_u8()?)
                .map_err(|value| Error::corrupt(offset, Corruption::InvalidVariableType(value)))?;
            let index = self.reader.read_u8()?;

            variables.push(FreeVariable { kind, index });
        }

        Ok(variables)
    }
}
