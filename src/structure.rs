use serde::{Deserialize, Serialize};

use crate::{string::StringMap, value::Constant};

/// Index of a structure instance inside a [`StructureHeap`].
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct StructureId(pub(crate) usize);

impl StructureId {
    #[inline(always)]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owns the structure instances created while a program runs. [`Constant::Structure`] values are
/// indices into a heap and never own the instance themselves.
///
/// Instances live until the heap is cleared or dropped.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StructureHeap {
    structures: Vec<StringMap>,
}

impl StructureHeap {
    pub fn new() -> Self {
        Self {
            structures: Vec::new(),
        }
    }

    pub fn alloc(&mut self, fields: StringMap) -> StructureId {
        let id = StructureId(self.structures.len());
        self.structures.push(fields);
        id
    }

    pub fn get(&self, id: StructureId) -> Option<&StringMap> {
        self.structures.get(id.0)
    }

    pub fn get_mut(&mut self, id: StructureId) -> Option<&mut StringMap> {
        self.structures.get_mut(id.0)
    }

    /// The value of field `name` of structure `id`, if both exist.
    pub fn field(&self, id: StructureId, name: &str) -> Option<Constant> {
        self.get(id).and_then(|fields| fields.get(name))
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn clear(&mut self) {
        self.structures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::string::StringList;

    #[test]
    fn allocated_structures_are_addressable() {
        let mut names = StringList::new();
        names.push("x").unwrap();
        names.push("y").unwrap();

        let mut heap = StructureHeap::new();
        let a = heap.alloc(StringMap::from_fields(
            &names,
            [Constant::Integer(1), Constant::Integer(2)],
        ));
        let b = heap.alloc(StringMap::with_names(&names));

        assert_ne!(a, b);
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.field(a, "y"), Some(Constant::Integer(2)));
        assert_eq!(heap.field(b, "y"), Some(Constant::None));
        assert_eq!(heap.field(a, "z"), None);
    }

    #[test]
    fn constants_reference_without_copying() {
        let mut heap = StructureHeap::new();
        let id = heap.alloc(StringMap::new());
        let reference = Constant::Structure(id);

        heap.get_mut(id)
            .unwrap()
            .bind_constant("값", Constant::Boolean(true));

        let id = reference.structure_or(()).unwrap();
        assert_eq!(heap.field(id, "값"), Some(Constant::Boolean(true)));
    }

    #[test]
    fn clear_releases_everything() {
        let mut heap = StructureHeap::new();
        heap.alloc(StringMap::new());
        heap.clear();

        assert!(heap.is_empty());
        assert_eq!(heap.get(StructureId::new(0)), None);
    }
}
