//! Merge-by-max-count reconciliation of extraction passes.
//!
//! Two passes over the same material each find some subset of the real
//! journeys. For every `(date, amount)` key the merged set keeps as many
//! copies as the pass that saw the most of them: entries found by both are
//! not double counted, entries found by only one are not lost.

use std::collections::BTreeMap;

use crate::models::{EntryKey, TravelEntry};

/// Merge two multisets, keeping `max(count_a, count_b)` copies per key.
///
/// The result is ordered by date, then amount.
pub fn merge(a: &[TravelEntry], b: &[TravelEntry]) -> Vec<TravelEntry> {
    let counts_a = count_by_key(a);
    let mut merged = count_by_key(b);

    for (key, count) in counts_a {
        let slot = merged.entry(key).or_insert(0);
        *slot = (*slot).max(count);
    }

    expand(merged)
}

/// Fold any number of passes with [`merge`]. Order does not matter.
pub fn merge_all<'a, I>(passes: I) -> Vec<TravelEntry>
where
    I: IntoIterator<Item = &'a [TravelEntry]>,
{
    passes
        .into_iter()
        .fold(Vec::new(), |acc, pass| merge(&acc, pass))
}

/// Occurrences of each key in a multiset.
pub fn count_by_key(entries: &[TravelEntry]) -> BTreeMap<EntryKey, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.key()).or_insert(0) += 1;
    }
    counts
}

fn expand(counts: BTreeMap<EntryKey, usize>) -> Vec<TravelEntry> {
    counts
        .into_iter()
        .filter_map(|(key, count)| TravelEntry::new(key.date, key.amount).map(|e| (e, count)))
        .flat_map(|(entry, count)| std::iter::repeat_n(entry, count))
        .collect()
}
