use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    frame::StackFrame,
    instruction::{FreeVariable, InstructionList, VariableType},
    string::{StringList, StringMap},
    value::{Constant, ConstantList},
};

/// Index of a [`FunctionInfo`] inside the [`ByteFile`](crate::ByteFile) that owns it.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct FunctionInfoId(pub(crate) usize);

impl FunctionInfoId {
    #[inline(always)]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a runtime [`Function`] inside the [`ByteFile`](crate::ByteFile) that owns it.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct FunctionId(pub(crate) usize);

impl FunctionId {
    #[inline(always)]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a function's source text starts.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Origin {
    pub path: Arc<str>,
    pub line: u16,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: Arc<str>,
    pub line: u16,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum LineEntry {
    /// Instructions from this offset on come from the given line.
    Line(u16),
    /// Instructions from this offset on come from another source file.
    Path(Arc<str>),
}

/// Maps instruction offsets back to source locations.
///
/// Records are kept in the order they were read, which for well-formed byte files is ascending
/// offset order.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct LineMap(Vec<(u32, LineEntry)>);

impl LineMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn add_line(&mut self, offset: u32, line: u16) {
        self.0.push((offset, LineEntry::Line(line)));
    }

    pub fn add_path(&mut self, offset: u32, path: impl Into<Arc<str>>) {
        self.0.push((offset, LineEntry::Path(path.into())));
    }

    pub fn get(&self, index: usize) -> Option<(u32, &LineEntry)> {
        self.0.get(index).map(|(offset, entry)| (*offset, entry))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &LineEntry)> {
        self.0.iter().map(|(offset, entry)| (*offset, entry))
    }

    pub fn is_sorted(&self) -> bool {
        self.0.windows(2).all(|pair| pair[0].0 <= pair[1].0)
    }

    /// Finds the source location of the instruction at `offset`, starting from `origin` and
    /// applying every record at or before `offset`.
    pub fn locate(&self, offset: usize, origin: &Origin) -> SourceLocation {
        let mut location = SourceLocation {
            path: origin.path.clone(),
            line: origin.line,
        };

        for (_, entry) in self.0.iter().take_while(|(at, _)| *at as usize <= offset) {
            match entry {
                LineEntry::Line(line) => location.line = *line,
                LineEntry::Path(path) => location.path = path.clone(),
            }
        }

        location
    }
}

/// The static description of a function: everything a byte file says about it.
///
/// Owned by the [`ByteFile`](crate::ByteFile) it was registered in and shared by every [`Function`]
/// created from it.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: Arc<str>,
    pub origin: Origin,
    /// Names of the function's josa parameters.
    pub josa_list: StringList,
    /// Names of the globals referenced by `LOAD_GLOBAL` and `STORE_GLOBAL`.
    pub global_list: Vec<Arc<str>>,
    /// Number of operands the function takes from the caller's stack.
    pub stack_operand_count: u64,
    pub local_variable_count: u32,
    pub constant_list: ConstantList,
    pub line_map: LineMap,
    pub instruction_list: InstructionList,
}

impl FunctionInfo {
    /// Evaluation stack slots a frame reserves above the locals and operands.
    pub const EVALUATION_SLOTS: usize = 256;

    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The number of slots a [`StackFrame`] for this function gets by default.
    pub fn frame_capacity(&self) -> usize {
        (self.local_variable_count as usize)
            .saturating_add(crate::utils::saturating_usize(self.stack_operand_count))
            .saturating_add(Self::EVALUATION_SLOTS)
    }

    pub fn source_location(&self, offset: usize) -> SourceLocation {
        self.line_map.locate(offset, &self.origin)
    }

    /// Writes a listing of this function's constants and code, one item per line.
    pub fn disassemble(&self, f: &mut impl fmt::Write) -> fmt::Result {
        writeln!(
            f,
            "function {} ({}:{}) locals={} stack={} josa={}",
            self.name,
            self.origin.path,
            self.origin.line,
            self.local_variable_count,
            self.stack_operand_count,
            self.josa_list.len(),
        )?;

        for (index, constant) in self.constant_list.iter().enumerate() {
            writeln!(f, "  const {index:>4}: {constant}")?;
        }

        for (index, global) in self.global_list.iter().enumerate() {
            writeln!(f, "  global {index:>3}: {global}")?;
        }

        let mut line = None;
        for (offset, instruction) in self.instruction_list.iter().enumerate() {
            let location = self.source_location(offset);
            let text = instruction.to_string();

            if line != Some(location.line) {
                line = Some(location.line);
                writeln!(f, "  {offset:>6}  {text:<32} ; {location}")?;
            } else {
                writeln!(f, "  {offset:>6}  {text}")?;
            }
        }

        Ok(())
    }
}

/// A function value: code plus the josa bindings and captured variables of one closure.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Function {
    info: FunctionInfoId,
    josa_map: StringMap,
    free_variables: Vec<Constant>,
}

impl Function {
    pub fn new(id: FunctionInfoId, info: &FunctionInfo) -> Self {
        Self {
            info: id,
            josa_map: StringMap::with_names(&info.josa_list),
            free_variables: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn info(&self) -> FunctionInfoId {
        self.info
    }

    pub fn josa_map(&self) -> &StringMap {
        &self.josa_map
    }

    pub fn josa_map_mut(&mut self) -> &mut StringMap {
        &mut self.josa_map
    }

    pub fn free_variables(&self) -> &[Constant] {
        &self.free_variables
    }

    pub fn free_variable(&self, index: usize) -> Option<Constant> {
        self.free_variables.get(index).copied()
    }

    pub fn with_free_variables(mut self, free_variables: Vec<Constant>) -> Self {
        self.free_variables = free_variables;
        self
    }

    /// Creates a closure over this function's code, capturing `variables` from the running
    /// function: `Local` entries read the locals of `frame`, `Free` entries read the captures of
    /// `enclosing`.
    pub fn capture(
        &self,
        variables: &[FreeVariable],
        frame: &StackFrame<'_>,
        enclosing: &Function,
    ) -> Result<Function> {
        let locals = frame.info().local_variable_count as usize;
        let free_variables = variables
            .iter()
            .map(|var| {
                let index = var.index as usize;
                let (value, available) = match var.kind {
                    // Slots past the locals belong to the evaluation stack.
                    VariableType::Local => (frame.slot(index).filter(|_| index < locals), locals),
                    VariableType::Free => (
                        enclosing.free_variable(index),
                        enclosing.free_variables.len(),
                    ),
                };

                value.ok_or(Error::CaptureOutOfRange {
                    kind: var.kind,
                    index: var.index,
                    available,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self.clone().with_free_variables(free_variables))
    }
}
