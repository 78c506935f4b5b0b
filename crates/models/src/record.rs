use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::StatsDelta;
use crate::delta::capped_add;

/// Cumulative statistics of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub total_size: u64,
    pub total_download_size: u64,
    pub file_count: u64,
    pub streamable_count: u64,
    #[serde(default)]
    pub extension_counts: AHashMap<String, u64>,
}

impl StatsRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` component-wise, capping every counter at [`COUNTER_MAX`](crate::COUNTER_MAX).
    /// Commutative and associative over any multiset of deltas.
    #[must_use]
    pub fn apply(mut self, delta: &StatsDelta) -> Self {
        self.total_size = capped_add(self.total_size, delta.size());
        self.total_download_size = capped_add(self.total_download_size, delta.download_size());
        self.file_count = capped_add(self.file_count, delta.files());
        self.streamable_count = capped_add(self.streamable_count, delta.streamable());

        for (category, count) in delta.extension_counts() {
            let slot = self.extension_counts.entry(category.clone()).or_insert(0);
            *slot = capped_add(*slot, *count);
        }

        self
    }

    /// The all-zero record.
    #[must_use]
    pub fn reset() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_size == 0
            && self.total_download_size == 0
            && self.file_count == 0
            && self.streamable_count == 0
            && self.extension_counts.is_empty()
    }

    /// Per-category counts sum to the file count and streamable files are a subset.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let categorized = self
            .extension_counts
            .values()
            .fold(0u64, |acc, count| acc.saturating_add(*count));
        categorized == self.file_count && self.streamable_count <= self.file_count
    }

    /// Categories ordered by descending count, ties broken by name.
    #[must_use]
    pub fn sorted_extensions(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self
            .extension_counts
            .iter()
            .map(|(category, count)| (category.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::COUNTER_MAX;
    use proptest::prelude::*;

    #[test]
    fn test_new_record_is_empty() {
        let record = StatsRecord::new();
        assert!(record.is_empty());
        assert!(record.is_consistent());
        assert_eq!(record, StatsRecord::reset());
    }

    #[test]
    fn test_apply_single_video() {
        let delta = StatsDelta::for_file("video", 1_048_576, 0, true);
        let record = StatsRecord::new().apply(&delta);

        assert_eq!(record.file_count, 1);
        assert_eq!(record.total_size, 1_048_576);
        assert_eq!(record.total_download_size, 0);
        assert_eq!(record.streamable_count, 1);
        assert_eq!(record.extension_counts.len(), 1);
        assert_eq!(record.extension_counts.get("video"), Some(&1));
        assert!(!record.is_empty());
    }

    #[test]
    fn test_apply_creates_missing_category() {
        let record = StatsRecord::new()
            .apply(&StatsDelta::for_file("video", 1, 0, true))
            .apply(&StatsDelta::for_file("unknown", 500, 0, false));

        assert_eq!(record.extension_counts.get("unknown"), Some(&1));
        assert_eq!(record.extension_counts.get("video"), Some(&1));
        assert!(record.is_consistent());
    }

    #[test]
    fn test_download_only_delta_keeps_counts() {
        let record = StatsRecord::new().apply(&StatsDelta::download_only(42));
        assert_eq!(record.total_download_size, 42);
        assert_eq!(record.file_count, 0);
        assert!(record.is_consistent());
        assert!(!record.is_empty());
    }

    #[test]
    fn test_apply_caps_at_counter_max() {
        let huge = StatsDelta::for_file("video", COUNTER_MAX, COUNTER_MAX, true);
        let record = StatsRecord::new().apply(&huge).apply(&huge);

        assert_eq!(record.total_size, COUNTER_MAX);
        assert_eq!(record.total_download_size, COUNTER_MAX);
        assert_eq!(record.file_count, 2);
    }

    #[test]
    fn test_is_consistent_near_the_limits() {
        let mut record = StatsRecord::new();
        record.file_count = u64::MAX;
        record.extension_counts.insert("video".into(), u64::MAX);
        record.extension_counts.insert("audio".into(), u64::MAX);

        assert!(record.is_consistent());
        record.file_count = 3;
        assert!(!record.is_consistent());
    }

    #[test]
    fn test_sorted_extensions() {
        let record = StatsRecord::new()
            .apply(&StatsDelta::for_file("pdf", 1, 0, false))
            .apply(&StatsDelta::for_file("video", 1, 0, true))
            .apply(&StatsDelta::for_file("video", 1, 0, true))
            .apply(&StatsDelta::for_file("archive", 1, 0, false));

        assert_eq!(
            record.sorted_extensions(),
            vec![("video", 2), ("archive", 1), ("pdf", 1)]
        );
    }

    #[test]
    fn test_json_roundtrip_of_empty_categories() {
        let json = r#"{"total_size":0,"total_download_size":0,"file_count":0,"streamable_count":0}"#;
        let record: StatsRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_empty());
    }

    fn arb_delta() -> impl Strategy<Value = StatsDelta> {
        (
            prop::sample::select(vec!["video", "audio", "archive", "pdf", "unknown"]),
            0u64..1_000_000,
            0u64..1_000_000,
            any::<bool>(),
        )
            .prop_map(|(category, size, download, streamable)| {
                StatsDelta::for_file(category, size, download, streamable)
            })
    }

    proptest! {
        #[test]
        fn prop_apply_is_order_independent(deltas in prop::collection::vec(arb_delta(), 0..32), seed in any::<u64>()) {
            let forward = deltas.iter().fold(StatsRecord::new(), |r, d| {
                let next = r.apply(d);
                assert!(next.is_consistent());
                next
            });

            let mut shuffled = deltas.clone();
            // Deterministic rotation plus reversal as a cheap permutation.
            if !shuffled.is_empty() {
                let len = shuffled.len();
                #[allow(clippy::cast_possible_truncation)]
                shuffled.rotate_left((seed as usize) % len);
                shuffled.reverse();
            }
            let permuted = shuffled.iter().fold(StatsRecord::new(), |r, d| r.apply(d));

            prop_assert_eq!(&forward, &permuted);

            let batched: StatsDelta = deltas.into_iter().collect();
            prop_assert_eq!(forward, StatsRecord::new().apply(&batched));
        }
    }
}
