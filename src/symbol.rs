use std::sync::Arc;

use crate::utils::FxHashSet;

/// Deduplicates names decoded from a byte file.
///
/// Josa lists, call sites and structure field lists repeat the same handful of names many times.
/// Every string passing through the same `Symbols` with the same spelling shares one allocation, so
/// a [`StringMap`](crate::StringMap) key built from a [`StringList`](crate::StringList) entry is the
/// very same `Arc<str>`, never a copy.
#[derive(Clone, Debug, Default)]
pub struct Symbols {
    strings: FxHashSet<Arc<str>>,
}

impl Symbols {
    pub fn new() -> Self {
        Self {
            strings: FxHashSet::default(),
        }
    }

    /// Returns the shared copy of `s`, inserting it first if this is the first time it is seen.
    pub fn intern(&mut self, s: impl AsRef<str>) -> Arc<str> {
        self.strings.get_or_insert_with(s.as_ref(), |s| Arc::from(s)).clone()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_spelling_shares_allocation() {
        let mut symbols = Symbols::new();

        let a = symbols.intern("을");
        let b = symbols.intern(String::from("을"));
        let c = symbols.intern("를");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(symbols.len(), 2);
    }

    #[test]
    fn interned_copy_outlives_source() {
        let mut symbols = Symbols::new();
        assert!(symbols.is_empty());

        let owned = String::from("값");
        let first = symbols.intern(&owned);
        drop(owned);

        let again = symbols.intern("값");
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(&*again, "값");
        assert_eq!(symbols.len(), 1);
    }
}
