use std::fmt;

const WORD: usize = 64;

/// Fixed-universe set of partition ids backed by 64-bit words.
///
/// Keeps its cardinality cached; `len()` is O(1).
#[derive(Clone, PartialEq, Eq, Default)]
pub struct PartitionSet {
    words: Vec<u64>,
    len: usize,
    universe: usize,
}

impl PartitionSet {
    pub fn empty(universe: usize) -> Self {
        Self {
            words: vec![0; universe.div_ceil(WORD)],
            len: 0,
            universe,
        }
    }

    pub fn full(universe: usize) -> Self {
        let mut set = Self::empty(universe);
        for (i, word) in set.words.iter_mut().enumerate() {
            let remaining = universe - i * WORD;
            *word = if remaining >= WORD { u64::MAX } else { (1u64 << remaining) - 1 };
        }
        set.len = universe;
        set
    }

    pub fn universe(&self) -> usize {
        self.universe
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, value: usize) -> bool {
        value < self.universe && self.words[value / WORD] & (1 << (value % WORD)) != 0
    }

    /// Returns `true` if the value was not present. Values outside the universe are ignored.
    pub fn insert(&mut self, value: usize) -> bool {
        if value >= self.universe || self.contains(value) {
            return false;
        }
        self.words[value / WORD] |= 1 << (value % WORD);
        self.len += 1;
        true
    }

    pub fn remove(&mut self, value: usize) -> bool {
        if !self.contains(value) {
            return false;
        }
        self.words[value / WORD] &= !(1 << (value % WORD));
        self.len -= 1;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        iter_words(self.words.iter().copied())
    }

    /// Values in `self` but not in `other`. Both sets must share a universe.
    pub fn difference<'a>(&'a self, other: &'a PartitionSet) -> impl Iterator<Item = usize> + 'a {
        iter_words(
            self.words
                .iter()
                .zip(other.words.iter().chain(std::iter::repeat(&0)))
                .map(|(a, b)| a & !b),
        )
    }

    pub fn intersection_len(&self, other: &PartitionSet) -> usize {
        self.words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }
}

fn iter_words(words: impl Iterator<Item = u64>) -> impl Iterator<Item = usize> {
    words.enumerate().flat_map(|(i, mut word)| {
        std::iter::from_fn(move || {
            if word == 0 {
                return None;
            }
            let bit = word.trailing_zeros() as usize;
            word &= word - 1;
            Some(i * WORD + bit)
        })
    })
}

impl fmt::Debug for PartitionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for PartitionSet {
    /// Universe grows to fit the largest value.
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let values: Vec<usize> = iter.into_iter().collect();
        let universe = values.iter().max().map_or(0, |m| m + 1);
        let mut set = Self::empty(universe);
        for value in values {
            set.insert(value);
        }
        set
    }
}
