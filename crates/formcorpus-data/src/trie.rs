use std::collections::BTreeMap;
use std::collections::btree_map;

/// Distinct token-code sequences with the number of times each was seen.
///
/// Iteration is in lexicographic sequence order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormulaTrie {
    entries: BTreeMap<Vec<u16>, u32>,
}

impl FormulaTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `tokens`. Empty sequences are ignored.
    pub fn insert(&mut self, tokens: &[u16]) {
        self.insert_count(tokens, 1);
    }

    pub fn insert_count(&mut self, tokens: &[u16], count: u32) {
        if tokens.is_empty() || count == 0 {
            return;
        }
        match self.entries.get_mut(tokens) {
            Some(existing) => *existing = existing.saturating_add(count),
            None => {
                self.entries.insert(tokens.to_vec(), count);
            }
        }
    }

    /// Add every entry of `other`, summing counts of shared sequences.
    pub fn merge(&mut self, other: FormulaTrie) {
        if self.entries.is_empty() {
            self.entries = other.entries;
            return;
        }
        for (tokens, count) in other.entries {
            let slot = self.entries.entry(tokens).or_insert(0);
            *slot = slot.saturating_add(count);
        }
    }

    pub fn get(&self, tokens: &[u16]) -> Option<u32> {
        self.entries.get(tokens).copied()
    }

    /// Number of distinct sequences.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries.values().map(|&c| u64::from(c)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u16], u32)> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), *v))
    }
}

impl<'a> IntoIterator for &'a FormulaTrie {
    type Item = (&'a Vec<u16>, &'a u32);
    type IntoIter = btree_map::Iter<'a, Vec<u16>, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
