use std::{fmt::Debug, hash::Hash, marker::PhantomData};

/// A trait to be implemented by any "index-like" types
pub trait Index: Copy + 'static + Eq + PartialEq + Ord + Debug + Hash {
    fn new(idx: usize) -> Self;

    fn index(self) -> usize;
}

macro_rules! simple_index {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
        $vis struct $name(u32);

        impl $crate::index::Index for $name {
            fn new(idx: usize) -> Self {
                Self(idx as _)
            }

            fn index(self) -> usize {
                self.0 as _
            }
        }
    };
}

pub(crate) use simple_index;

/// A vector of arena slots addressed by a typed index. Slots are tombstoned
/// instead of removed so an index is never handed out twice.
pub struct IndexVec<I: Index, T> {
    pub raw: Vec<Option<T>>,
    _marker: PhantomData<fn(&I)>,
}

impl<I: Index, T> IndexVec<I, T> {
    /// Constructs a new, empty `IndexVec<I, T>`.
    #[inline]
    pub const fn new() -> Self {
        IndexVec {
            raw: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Pushes an element to the array returning the index where it was pushed to.
    #[inline]
    pub fn push(&mut self, d: T) -> I {
        let idx = self.next_index();
        self.raw.push(Some(d));
        idx
    }

    /// Tombstones the slot at `index`, returning what it held.
    #[inline]
    pub fn remove(&mut self, index: I) -> Option<T> {
        self.raw.get_mut(index.index()).and_then(Option::take)
    }

    /// Iterates the live slots together with their index.
    pub fn enumerate(&self) -> impl Iterator<Item = (I, &'_ T)> {
        self.raw
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (I::new(i), v)))
    }

    pub fn indices(&self) -> impl Iterator<Item = I> + '_ {
        self.enumerate().map(|(i, _)| i)
    }

    /// Number of slots ever allocated, live or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Gives the next index that will be assigned when `push` is called.
    #[inline]
    pub fn next_index(&self) -> I {
        I::new(self.len())
    }

    #[inline]
    pub fn contains(&self, index: I) -> bool {
        self.get(index).is_some()
    }

    #[inline]
    pub fn get(&self, index: I) -> Option<&T> {
        self.raw.get(index.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, index: I) -> Option<&mut T> {
        self.raw.get_mut(index.index()).and_then(Option::as_mut)
    }
}

impl<I: Index, T> Default for IndexVec<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Index, T: Debug> Debug for IndexVec<I, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.enumerate()).finish()
    }
}

impl<I: Index, T> core::ops::Index<I> for IndexVec<I, T> {
    type Output = T;

    fn index(&self, index: I) -> &Self::Output {
        match self.get(index) {
            Some(value) => value,
            None => panic!("stale handle {index:?} used after its slot was removed"),
        }
    }
}

impl<I: Index, T> core::ops::IndexMut<I> for IndexVec<I, T> {
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("stale handle {index:?} used after its slot was removed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    simple_index! {
        struct TestId;
    }

    #[test]
    fn removed_slots_are_never_reused() {
        let mut vec: IndexVec<TestId, &str> = IndexVec::new();
        let a = vec.push("a");
        let b = vec.push("b");

        assert_eq!(vec.remove(a), Some("a"));
        assert!(!vec.contains(a));

        let c = vec.push("c");
        assert_ne!(a, c);
        assert_eq!(vec.indices().collect::<Vec<_>>(), vec![b, c]);
    }

    #[test]
    #[should_panic(expected = "stale handle")]
    fn indexing_a_removed_slot_panics() {
        let mut vec: IndexVec<TestId, u8> = IndexVec::new();
        let a = vec.push(1);
        vec.remove(a);
        let _ = vec[a];
    }
}
