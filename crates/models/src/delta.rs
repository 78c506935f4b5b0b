use ahash::AHashMap;

/// Largest value any counter takes; storage keeps counters as signed 64-bit integers.
pub const COUNTER_MAX: u64 = i64::MAX.unsigned_abs();

/// Addition that sticks at [`COUNTER_MAX`].
#[must_use]
pub(crate) const fn capped_add(a: u64, b: u64) -> u64 {
    let sum = a.saturating_add(b);
    if sum > COUNTER_MAX { COUNTER_MAX } else { sum }
}

/// Increment to merge into a user's record.
///
/// Constructed per file (or merged from several files), so `streamable <= files` and the
/// per-category counts always sum to `files`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsDelta {
    files: u64,
    size: u64,
    download_size: u64,
    streamable: u64,
    extension_counts: AHashMap<String, u64>,
}

impl StatsDelta {
    /// Delta contributed by a single file.
    #[must_use]
    pub fn for_file(category: impl Into<String>, size: u64, download_size: u64, streamable: bool) -> Self {
        let mut extension_counts = AHashMap::with_capacity(1);
        extension_counts.insert(category.into(), 1);

        Self {
            files: 1,
            size,
            download_size,
            streamable: u64::from(streamable),
            extension_counts,
        }
    }

    /// Delta that only moves the download counter, e.g. the container of an archive.
    #[must_use]
    pub fn download_only(download_size: u64) -> Self {
        Self {
            download_size,
            ..Self::default()
        }
    }

    /// Folds `other` into `self`. Order of merging never matters.
    pub fn merge(&mut self, other: &Self) {
        self.files = capped_add(self.files, other.files);
        self.size = capped_add(self.size, other.size);
        self.download_size = capped_add(self.download_size, other.download_size);
        self.streamable = capped_add(self.streamable, other.streamable);
        for (category, count) in &other.extension_counts {
            let slot = self.extension_counts.entry(category.clone()).or_insert(0);
            *slot = capped_add(*slot, *count);
        }
    }

    #[must_use]
    pub const fn files(&self) -> u64 {
        self.files
    }

    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub const fn download_size(&self) -> u64 {
        self.download_size
    }

    #[must_use]
    pub const fn streamable(&self) -> u64 {
        self.streamable
    }

    #[must_use]
    pub const fn extension_counts(&self) -> &AHashMap<String, u64> {
        &self.extension_counts
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files == 0 && self.size == 0 && self.download_size == 0
    }
}

impl FromIterator<StatsDelta> for StatsDelta {
    fn from_iter<I: IntoIterator<Item = StatsDelta>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |mut acc, delta| {
            acc.merge(&delta);
            acc
        })
    }
}
