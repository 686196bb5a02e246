use std::{ops::Index, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    utils::FxIndexMap,
    value::Constant,
};

/// An ordered list of at most 255 names: a function's josa list, the josa list of a call site, or
/// the field names of a structure.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct StringList(Vec<Arc<str>>);

impl StringList {
    /// The largest number of entries a list can hold, since its count is encoded in one byte.
    pub const MAX_LEN: usize = u8::MAX as usize;

    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: u8) -> Self {
        Self(Vec::with_capacity(capacity as usize))
    }

    pub fn push(&mut self, s: impl Into<Arc<str>>) -> Result<()> {
        if self.0.len() == Self::MAX_LEN {
            return Err(Error::StringListFull);
        }

        self.0.push(s.into());
        Ok(())
    }

    pub fn get(&self, index: u8) -> Option<&Arc<str>> {
        self.0.get(index as usize)
    }

    /// The UTF-8 length in bytes of the entry at `index`.
    pub fn byte_len(&self, index: u8) -> Option<usize> {
        self.get(index).map(|s| s.len())
    }

    /// The index of the first entry spelled `name`.
    pub fn position(&self, name: &str) -> Option<u8> {
        self.0
            .iter()
            .position(|s| &**s == name)
            .map(|idx| idx as u8)
    }

    pub fn len(&self) -> u8 {
        // Never exceeds MAX_LEN; see `push`.
        self.0.len() as u8
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Arc<str>> {
        self.0.iter()
    }
}

impl Index<u8> for StringList {
    type Output = str;

    fn index(&self, index: u8) -> &Self::Output {
        &self.0[index as usize]
    }
}

impl TryFrom<Vec<Arc<str>>> for StringList {
    type Error = Error;

    fn try_from(value: Vec<Arc<str>>) -> Result<Self> {
        if value.len() > Self::MAX_LEN {
            Err(Error::StringListFull)
        } else {
            Ok(Self(value))
        }
    }
}

/// An ordered mapping from names to values.
///
/// Used for runtime structure instances (field name to value) and for binding named call-site
/// arguments to parameters (josa binding). Keys are the same `Arc<str>` as the [`StringList`]
/// entries they were bound from. Entries keep the order in which their names were first bound;
/// binding a name again replaces the value in place.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct StringMap(FxIndexMap<Arc<str>, Constant>);

impl StringMap {
    pub fn new() -> Self {
        Self(FxIndexMap::default())
    }

    /// Creates a binding template with every name in `names` bound to [`Constant::None`].
    pub fn with_names(names: &StringList) -> Self {
        let mut map =
            FxIndexMap::with_capacity_and_hasher(names.len() as usize, Default::default());
        map.extend(names.iter().map(|name| (name.clone(), Constant::None)));

        Self(map)
    }

    /// Materializes a structure instance, binding each field name to the value at the same
    /// position. Names without a matching value are bound to [`Constant::None`].
    pub fn from_fields<I>(names: &StringList, values: I) -> Self
    where
        I: IntoIterator<Item = Constant>,
    {
        let mut map = Self::with_names(names);

        for (name, value) in names.iter().zip(values) {
            map.bind_constant(name.clone(), value);
        }

        map
    }

    /// Binds `name` to `constant`. If `name` is already bound, the old value is returned and the
    /// entry keeps its position.
    pub fn bind_constant(
        &mut self,
        name: impl Into<Arc<str>>,
        constant: Constant,
    ) -> Option<Constant> {
        self.0.insert(name.into(), constant)
    }

    pub fn get(&self, name: &str) -> Option<Constant> {
        self.0.get(name).copied()
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Constant> {
        self.0.get_mut(name)
    }

    pub fn get_index(&self, index: usize) -> Option<(&Arc<str>, Constant)> {
        self.0.get_index(index).map(|(k, v)| (k, *v))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Constant)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Arc<str>> {
        self.0.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Symbols;

    fn list(names: &[&str]) -> StringList {
        let mut symbols = Symbols::new();
        let mut list = StringList::new();

        for name in names {
            list.push(symbols.intern(name)).unwrap();
        }

        list
    }

    #[test]
    fn list_rejects_256th_entry() {
        let mut list = StringList::new();

        for i in 0..StringList::MAX_LEN {
            list.push(i.to_string()).unwrap();
        }

        assert_eq!(list.len(), 255);
        assert!(matches!(list.push("넘침"), Err(Error::StringListFull)));
    }

    #[test]
    fn byte_len_is_utf8_length() {
        let list = list(&["a", "에게"]);

        assert_eq!(list.byte_len(0), Some(1));
        assert_eq!(list.byte_len(1), Some(6));
        assert_eq!(list.byte_len(2), None);
        assert_eq!(&list[1], "에게");
        assert_eq!(list.position("에게"), Some(1));
    }

    #[test]
    fn template_binds_every_name_to_none() {
        let names = list(&["을", "에"]);
        let map = StringMap::with_names(&names);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("을"), Some(Constant::None));
        assert_eq!(map.get("에"), Some(Constant::None));
        assert_eq!(map.get("로"), None);
    }

    #[test]
    fn keys_share_list_storage() {
        let names = list(&["x"]);
        let map = StringMap::with_names(&names);

        let key = map.keys().next().unwrap();
        assert!(Arc::ptr_eq(key, names.get(0).unwrap()));
    }

    #[test]
    fn rebinding_overwrites_in_place() {
        let names = list(&["을", "에"]);
        let mut map = StringMap::with_names(&names);

        assert_eq!(map.bind_constant("을", Constant::Integer(1)), Some(Constant::None));
        map.bind_constant("에", Constant::Integer(2));
        assert_eq!(map.bind_constant("을", Constant::Integer(3)), Some(Constant::Integer(1)));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("을"), Some(Constant::Integer(3)));

        let (first, value) = map.get_index(0).unwrap();
        assert_eq!(&**first, "을");
        assert_eq!(value, Constant::Integer(3));
    }

    #[test]
    fn fields_pair_up_with_values() {
        let names = list(&["x", "y", "z"]);
        let map = StringMap::from_fields(&names, [Constant::Integer(1), Constant::Real(2.0)]);

        assert_eq!(map.get("x"), Some(Constant::Integer(1)));
        assert_eq!(map.get("y"), Some(Constant::Real(2.0)));
        assert_eq!(map.get("z"), Some(Constant::None));
        assert_eq!(map.keys().map(|k| &**k).collect::<Vec<_>>(), ["x", "y", "z"]);
    }
}
