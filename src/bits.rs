//! Bit sets in the format `evdev` reports capabilities in.
//!
//! `EVIOCGBIT` fills a caller-provided array of `unsigned long`s. Bit *n* of the set lives in word
//! `n / Word::BITS`, at bit offset `n % Word::BITS` within that word. [`BitSet`] stores exactly
//! that array, so it can be handed to the kernel (or to a test double) verbatim.

mod iter;

use std::{ffi::c_ulong, fmt, slice};

/// The underlying word type used by [`BitSet`]s.
///
/// This is an `unsigned long` in C, which may vary between platforms.
pub type Word = c_ulong;

/// A set of small integers (event types or event codes), stored as a bit set.
#[derive(Clone, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<Word>,
}

impl BitSet {
    /// Creates an empty bit set that can hold every value in `0..=max`.
    pub fn new(max: usize) -> Self {
        Self {
            words: vec![0; (max + 1).div_ceil(Word::BITS as usize)],
        }
    }

    /// Creates a bit set from raw words, as returned by the kernel.
    pub fn from_words(words: Vec<Word>) -> Self {
        Self { words }
    }

    /// Returns a reference to the underlying [`Word`]s making up this [`BitSet`].
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Returns a mutable reference to the underlying [`Word`]s making up this [`BitSet`].
    ///
    /// This is the buffer that gets passed to `EVIOCGBIT`.
    pub fn words_mut(&mut self) -> &mut [Word] {
        &mut self.words
    }

    /// Returns the number of values this set has room for.
    pub fn capacity(&self) -> usize {
        self.words.len() * Word::BITS as usize
    }

    /// Returns the number of elements in this [`BitSet`] (the number of set bits).
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns whether this [`BitSet`] is empty (contains no set bits).
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Returns whether `self` contains `value`.
    pub fn contains(&self, value: usize) -> bool {
        let wordpos = value / Word::BITS as usize;
        let bitpos = value % Word::BITS as usize;

        match self.words.get(wordpos) {
            Some(word) => word & (1 << bitpos) != 0,
            None => false,
        }
    }

    /// Inserts `value` into `self`, setting the appropriate bit.
    ///
    /// Returns `true` if `value` was already present.
    ///
    /// # Panics
    ///
    /// Panics if `value` doesn't fit into the set's [capacity](BitSet::capacity).
    pub fn insert(&mut self, value: usize) -> bool {
        assert!(
            value < self.capacity(),
            "value out of range for `BitSet` storage (value is {}, capacity is {})",
            value,
            self.capacity(),
        );

        let present = self.contains(value);
        self.words[value / Word::BITS as usize] |= 1 << (value % Word::BITS as usize);
        present
    }

    /// Removes `value` from the set.
    ///
    /// Returns `true` if it was present and has been removed, or `false` if it was not present.
    pub fn remove(&mut self, value: usize) -> bool {
        let present = self.contains(value);
        if present {
            self.words[value / Word::BITS as usize] &= !(1 << (value % Word::BITS as usize));
        }
        present
    }

    /// Returns an iterator over all values in `self`, in ascending order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            imp: iter::IterImpl::new(self.words.iter().copied()),
        }
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a BitSet {
    type Item = usize;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the values stored in a [`BitSet`].
#[derive(Clone)]
pub struct Iter<'a> {
    imp: iter::IterImpl<std::iter::Copied<slice::Iter<'a, Word>>>,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        self.imp.next()
    }
}

impl fmt::Debug for Iter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Iter")
            .field(&DebugAsSet(self.clone()))
            .finish()
    }
}

struct DebugAsSet<I>(I);
impl<I: Clone + Iterator> fmt::Debug for DebugAsSet<I>
where
    I::Item: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.clone()).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::event::{EventType, KEY_MAX};

    use super::*;

    #[test]
    fn sizes() {
        // Event types fit into a single word on every platform.
        assert_eq!(BitSet::new(EventType::MAX.raw().into()).words().len(), 1);
        assert_eq!(
            BitSet::new(KEY_MAX.into()).capacity(),
            (usize::from(KEY_MAX) + 1).next_multiple_of(Word::BITS as usize)
        );
    }

    #[test]
    fn bit0() {
        let mut set = BitSet::new(31);
        set.insert(0);

        assert!(set.contains(0));
        assert!(!set.contains(1));
        assert!(!set.contains(10_000));
        assert_eq!(set.words()[0], 1);
        assert_eq!(set.iter().collect::<Vec<_>>(), &[0]);
    }

    #[test]
    fn word_packing() {
        // Bit `n` lives in word `n / BITS` at offset `n % BITS`.
        let bits = Word::BITS as usize;
        let mut set = BitSet::new(3 * bits - 1);
        set.insert(bits + 3);
        set.insert(2 * bits - 1);

        assert_eq!(set.words()[0], 0);
        assert_eq!(set.words()[1], (1 << 3) | (1 << (bits - 1)));
        assert_eq!(set.words()[2], 0);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            &[bits + 3, 2 * bits - 1]
        );
    }

    #[test]
    fn from_words() {
        let set = BitSet::from_words(vec![0b10_0010_0010, 0, 1]);
        assert_eq!(set.len(), 4);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            &[1, 5, 9, 2 * Word::BITS as usize]
        );
    }

    #[test]
    fn multiple() {
        let mut set = BitSet::new(KEY_MAX.into());
        assert!(set.is_empty());
        assert!(!set.insert(0x2ff));
        assert!(!set.insert(0x130));
        assert!(!set.insert(0));
        assert!(set.insert(0x130));

        assert_eq!(set.len(), 3);
        assert_eq!(set.iter().collect::<Vec<_>>(), &[0, 0x130, 0x2ff]);
        assert_eq!(format!("{set:?}"), "{0, 304, 767}");

        let mut iter = set.iter();
        assert_eq!(iter.next(), Some(0));
        assert_eq!(format!("{iter:?}"), "Iter({304, 767})");

        assert!(set.remove(0x130));
        assert!(!set.remove(0x130));
        assert!(!set.remove(100_000));
        assert_eq!(set.iter().collect::<Vec<_>>(), &[0, 0x2ff]);
    }

    #[test]
    #[should_panic = "value out of range for `BitSet`"]
    fn above_capacity() {
        let mut set = BitSet::new(0);
        let cap = set.capacity();
        set.insert(cap);
    }
}
