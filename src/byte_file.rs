use std::{fmt, sync::Arc};

use hashbrown::hash_map::RawEntryMut;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, Result},
    function::{Function, FunctionId, FunctionInfo, FunctionInfoId},
    utils::FxHashMap,
};

/// A loaded program: every function descriptor and runtime function of one byte file.
///
/// The byte file is the only owner of these objects. Everything else refers to them by
/// [`FunctionInfoId`] or [`FunctionId`], so releasing the byte file (or calling [`clear`]) frees
/// each of them exactly once, whatever references they hold to each other.
///
/// [`clear`]: ByteFile::clear
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ByteFile {
    infos: Vec<FunctionInfo>,
    functions: Vec<Function>,
    root: Option<FunctionId>,
    names: FxHashMap<Arc<str>, FunctionInfoId>,
}

impl ByteFile {
    pub fn new() -> Self {
        Self {
            infos: Vec::new(),
            functions: Vec::new(),
            root: None,
            names: FxHashMap::default(),
        }
    }

    /// Takes ownership of `info`, creates the one runtime [`Function`] paired with it, and returns
    /// the id of that function.
    pub fn register_function(&mut self, info: FunctionInfo) -> FunctionId {
        let info_id = FunctionInfoId(self.infos.len());
        let function = Function::new(info_id, &info);

        // The first function registered under a name keeps it.
        if let RawEntryMut::Vacant(entry) = self.names.raw_entry_mut().from_key(&*info.name) {
            entry.insert(info.name.clone(), info_id);
        }
        self.infos.push(info);

        let id = self.add_function(function);
        debug!(
            name = %self.infos[info_id.0].name,
            info = info_id.0,
            function = id.0,
            "function registered"
        );
        id
    }

    /// Registers a runtime function built elsewhere, such as a closure, without creating a new
    /// descriptor.
    pub fn add_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId(self.functions.len());
        self.functions.push(function);
        id
    }

    pub fn root(&self) -> Option<&Function> {
        self.root.and_then(|id| self.function(id))
    }

    pub fn root_id(&self) -> Option<FunctionId> {
        self.root
    }

    /// The descriptor of the root function.
    pub fn root_info(&self) -> Option<&FunctionInfo> {
        self.root.and_then(|id| self.info_of(id))
    }

    /// Designates the program entry point. The root can only be set once.
    pub fn set_root(&mut self, id: FunctionId) -> Result<()> {
        if self.root.is_some() {
            return Err(Error::RootAlreadySet);
        }

        if id.0 >= self.functions.len() {
            return Err(Error::UnknownFunction(id));
        }

        self.root = Some(id);
        Ok(())
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0)
    }

    pub fn function_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        self.functions.get_mut(id.0)
    }

    pub fn info(&self, id: FunctionInfoId) -> Option<&FunctionInfo> {
        self.infos.get(id.0)
    }

    /// The descriptor of the code run by function `id`.
    pub fn info_of(&self, id: FunctionId) -> Option<&FunctionInfo> {
        self.function(id).and_then(|function| self.info(function.info()))
    }

    /// Finds the first descriptor registered under `name`.
    pub fn find_info(&self, name: &str) -> Option<(FunctionInfoId, &FunctionInfo)> {
        let id = *self.names.get(name)?;
        self.info(id).map(|info| (id, info))
    }

    /// All descriptors, in registration order.
    pub fn infos(&self) -> impl ExactSizeIterator<Item = (FunctionInfoId, &FunctionInfo)> {
        self.infos
            .iter()
            .enumerate()
            .map(|(idx, info)| (FunctionInfoId(idx), info))
    }

    /// All runtime functions, in registration order.
    pub fn functions(&self) -> impl ExactSizeIterator<Item = (FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(idx, function)| (FunctionId(idx), function))
    }

    pub fn info_count(&self) -> usize {
        self.infos.len()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty() && self.functions.is_empty()
    }

    /// Releases every registered descriptor and function and forgets the root.
    pub fn clear(&mut self) {
        self.infos.clear();
        self.functions.clear();
        self.names.clear();
        self.root = None;
    }

    /// Writes a disassembly of every descriptor, in registration order.
    pub fn disassemble(&self, f: &mut impl fmt::Write) -> fmt::Result {
        for (id, info) in self.infos() {
            if self.root_info().map(|root| std::ptr::eq(root, info)) == Some(true) {
                writeln!(f, "; root")?;
            }
            write!(f, "#{} ", id.index())?;
            info.disassemble(f)?;
            writeln!(f)?;
        }

        Ok(())
    }
}
