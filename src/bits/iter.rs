//! Ascending iteration over the set bits of a word sequence.

use super::Word;

#[derive(Clone)]
pub struct IterImpl<N> {
    next_word: N,
    word: Word,
    bits_left: u32,    // bits left in `word`
    next_index: usize, // element index of the lowest bit in `word`
}

impl<N> IterImpl<N> {
    pub fn new(next_word: N) -> Self {
        Self {
            next_word,
            word: 0,
            bits_left: 0,
            next_index: 0,
        }
    }
}

impl<N: Iterator<Item = Word>> Iterator for IterImpl<N> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.word == 0 {
            self.next_index += self.bits_left as usize;
            self.bits_left = 0;
        }
        if self.bits_left == 0 {
            // Refill `self.word` with a word that contains at least one set bit.
            loop {
                self.word = self.next_word.next()?;

                if self.word == 0 {
                    self.next_index += Word::BITS as usize;
                } else {
                    break;
                }
            }
            self.bits_left = Word::BITS;
        }

        // Since we never keep an all-zeroes word around, there must be a 1 in there.
        let zeroes = self.word.trailing_zeros();
        debug_assert_ne!(zeroes, Word::BITS);

        let index = self.next_index + zeroes as usize;

        // Shift the 1 and all preceding zeroes out of the word. Two shifts, since shifting by
        // `Word::BITS` at once would overflow when the top bit is the one we found.
        self.word >>= zeroes as usize;
        self.word >>= 1;

        self.next_index += zeroes as usize + 1;
        self.bits_left -= zeroes + 1;

        Some(index)
    }
}
