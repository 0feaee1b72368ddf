//! Process wide interning of binder names and string constants. Every fresh
//! variable interns its name, so lookups by string go through a hash map.

use std::sync::RwLock;

use hashbrown::HashMap;
use once_cell::sync::Lazy;

#[derive(Debug, Default)]
struct Strings {
    by_index: Vec<&'static str>,
    by_value: HashMap<&'static str, u32>,
}

#[derive(Debug, Default)]
pub struct InterningTable {
    strings: RwLock<Strings>,
}

pub static INTERNING_TABLE: Lazy<InterningTable> = Lazy::new(Default::default);

impl InterningTable {
    pub fn get(&self, index: u32) -> Option<&'static str> {
        let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());

        strings.by_index.get(index as usize).copied()
    }

    pub fn insert_if_absent(&self, string: &str) -> u32 {
        if let Some(index) = self.lookup(string) {
            return index;
        }

        let mut strings = self.strings.write().unwrap_or_else(|e| e.into_inner());

        // Another thread may have won the race between the two locks
        if let Some(index) = strings.by_value.get(string) {
            return *index;
        }

        let leaked: &'static str = Box::leak(string.to_owned().into_boxed_str());
        let index = strings.by_index.len() as u32;

        strings.by_index.push(leaked);
        strings.by_value.insert(leaked, index);

        index
    }

    fn lookup(&self, string: &str) -> Option<u32> {
        let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());

        strings.by_value.get(string).copied()
    }
}

/// A name or string constant, compared by identity
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedSymbol(u32);

impl InternedSymbol {
    pub fn new(value: &str) -> Self {
        Self(INTERNING_TABLE.insert_if_absent(value))
    }

    pub fn value(&self) -> &'static str {
        INTERNING_TABLE.get(self.0).expect(
            "Once an interned symbol is created, the string it references should never be removed from the table",
        )
    }
}

impl From<&str> for InternedSymbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl core::fmt::Debug for InternedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}#{}", self.value(), self.0)
    }
}

impl core::fmt::Display for InternedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.value())
    }
}
