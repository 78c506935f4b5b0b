use ahash::AHashSet;
use color_eyre::eyre;
use filestats_config::Settings;
use filestats_core::{Result, SqliteStatsStore, StatsStore, StoreOptions};
use filestats_models::{FileDescriptor, Locale, StatsDelta, StatsRecord, UserId};
use filestats_ui::{BuiltinCatalog, Catalog, Rendered, format_stats};
use filestats_utils::{Classification, classify, file_suffix, format_bytes, normalize_extension};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Entry point used by the transport: classifies incoming files, keeps the per-user
/// statistics and renders reports.
#[derive(Clone)]
pub struct FileStatsService {
    store: Arc<dyn StatsStore>,
    catalog: Arc<dyn Catalog>,
    default_locale: Locale,
}

impl std::fmt::Debug for FileStatsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStatsService")
            .field("default_locale", &self.default_locale)
            .finish_non_exhaustive()
    }
}

impl FileStatsService {
    #[must_use]
    pub fn new(store: Arc<dyn StatsStore>, default_locale: Locale) -> Self {
        Self {
            store,
            catalog: Arc::new(BuiltinCatalog),
            default_locale,
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Opens the configured database and builds a service around it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database location cannot be resolved or the store cannot be opened.
    pub async fn from_settings(settings: &Settings) -> eyre::Result<Self> {
        let path = settings.database_location().await?;
        let options = StoreOptions {
            max_connections: settings.max_connections,
            busy_timeout: Duration::from_secs(settings.busy_timeout_secs),
        };
        let store = SqliteStatsStore::open(&path, options).await?;

        Ok(Self::new(Arc::new(store), settings.locale()))
    }

    #[must_use]
    pub const fn default_locale(&self) -> &Locale {
        &self.default_locale
    }

    /// Counts one file for `user` and returns the updated statistics.
    ///
    /// Files whose extension is on the user's ignore list are not counted; the current
    /// record is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is malformed or the update cannot be persisted.
    pub async fn record_file_event(&self, user: UserId, file: &FileDescriptor) -> Result<StatsRecord> {
        let sizes = file.validate()?;

        if self.is_ignored(user, file, &self.ignore_set(user, file).await?) {
            return self.store.get(user).await;
        }

        let classification = self.classify_logged(user, file);
        let delta = StatsDelta::for_file(
            classification.category,
            sizes.size,
            sizes.download_size,
            classification.streamable,
        );

        let record = self.store.apply_event(user, &delta).await?;
        info!(
            "File received from user {}: {} ({})",
            user,
            file.file_name().unwrap_or("<unnamed>"),
            format_bytes(sizes.size)
        );
        Ok(record)
    }

    /// Counts every member of an archive as a file and the archive itself as downloaded data.
    ///
    /// Members are applied together as one update, so a failure counts none of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive or any member is malformed, or if the update cannot be persisted.
    pub async fn record_archive_event(
        &self,
        user: UserId,
        archive: &FileDescriptor,
        members: &[FileDescriptor],
    ) -> Result<StatsRecord> {
        let archive_sizes = archive.validate()?;
        let member_sizes = members
            .iter()
            .map(FileDescriptor::validate)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let ignored = self.store.ignored_extensions(user).await?;
        let ignored: AHashSet<String> = ignored.into_iter().collect();

        let mut delta: StatsDelta = members
            .iter()
            .zip(member_sizes)
            .filter(|(member, _)| !self.is_ignored(user, member, &ignored))
            .map(|(member, sizes)| {
                let classification = self.classify_logged(user, member);
                StatsDelta::for_file(classification.category, sizes.size, 0, classification.streamable)
            })
            .collect();

        // The archive is what was actually downloaded.
        let downloaded = if archive.download_size.is_some() {
            archive_sizes.download_size
        } else {
            archive_sizes.size
        };
        delta.merge(&StatsDelta::download_only(downloaded));

        let record = self.store.apply_event(user, &delta).await?;
        info!(
            "Archive {} from user {}: {} of {} file(s) counted",
            archive.file_name().unwrap_or("<unnamed>"),
            user,
            delta.files(),
            members.len()
        );
        Ok(record)
    }

    /// Current statistics without rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub async fn stats(&self, user: UserId) -> Result<StatsRecord> {
        self.store.get(user).await
    }

    /// Renders the user's statistics in `locale`, or the service's default locale.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub async fn query_stats(&self, user: UserId, locale: Option<&Locale>) -> Result<Rendered> {
        let record = self.store.get(user).await?;
        Ok(format_stats(&record, locale.unwrap_or(&self.default_locale), self.catalog.as_ref()))
    }

    /// # Errors
    ///
    /// Returns an error if the reset cannot be persisted.
    pub async fn reset_stats(&self, user: UserId) -> Result<StatsRecord> {
        self.store.reset(user).await
    }

    /// Resets the user's statistics and returns what they were just before.
    ///
    /// The transport uses the previous record to tell "reset done" from "nothing to reset".
    ///
    /// # Errors
    ///
    /// Returns an error if the reset cannot be persisted.
    pub async fn take_stats(&self, user: UserId) -> Result<StatsRecord> {
        self.store.take(user).await
    }

    /// Whether a reset would change anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    pub async fn has_statistics(&self, user: UserId) -> Result<bool> {
        Ok(!self.store.get(user).await?.is_empty())
    }

    /// Adds extensions to the user's ignore list. Returns the newly ignored ones, normalized.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be persisted.
    pub async fn ignore_extensions<S: AsRef<str>>(&self, user: UserId, extensions: &[S]) -> Result<Vec<String>> {
        let normalized = normalize_all(extensions);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }
        let added = self.store.add_ignored_extensions(user, &normalized).await?;
        if !added.is_empty() {
            info!("User {} now ignores {}", user, added.join(", "));
        }
        Ok(added)
    }

    /// Removes extensions from the user's ignore list. Returns the ones that were ignored before.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be persisted.
    pub async fn unignore_extensions<S: AsRef<str>>(&self, user: UserId, extensions: &[S]) -> Result<Vec<String>> {
        let normalized = normalize_all(extensions);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }
        let removed = self.store.remove_ignored_extensions(user, &normalized).await?;
        if !removed.is_empty() {
            info!("User {} no longer ignores {}", user, removed.join(", "));
        }
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns an error if the list cannot be read.
    pub async fn ignored_extensions(&self, user: UserId) -> Result<Vec<String>> {
        self.store.ignored_extensions(user).await
    }

    /// Deletes every trace of the user, ignore list included.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn forget_user(&self, user: UserId) -> Result<bool> {
        self.store.remove(user).await
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub async fn user_count(&self) -> Result<usize> {
        self.store.len().await
    }

    async fn ignore_set(&self, user: UserId, file: &FileDescriptor) -> Result<AHashSet<String>> {
        // Files without a suffix can never match, skip the lookup.
        if file.file_name().and_then(file_suffix).is_none() {
            return Ok(AHashSet::new());
        }
        Ok(self.store.ignored_extensions(user).await?.into_iter().collect())
    }

    fn is_ignored(&self, user: UserId, file: &FileDescriptor, ignored: &AHashSet<String>) -> bool {
        let Some(suffix) = file.file_name().and_then(file_suffix) else {
            return false;
        };
        let skip = ignored.contains(&suffix);
        if skip {
            info!(
                "File {} from user {} ignored due to its extension ({})",
                file.file_name().unwrap_or_default(),
                user,
                suffix
            );
        }
        skip
    }

    fn classify_logged(&self, user: UserId, file: &FileDescriptor) -> Classification {
        let classification = classify(file);
        if classification.is_degraded() {
            debug!(
                "Could not classify file {:?} (mime {:?}) from user {}, counting it as {}",
                file.file_name(),
                file.mime(),
                user,
                classification.category
            );
        }
        classification
    }
}

fn normalize_all<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    let mut seen = AHashSet::new();
    extensions
        .iter()
        .filter_map(|raw| {
            let normalized = normalize_extension(raw.as_ref());
            if normalized.is_none() {
                debug!("Skipping invalid extension {:?}", raw.as_ref());
            }
            normalized
        })
        .filter(|ext| seen.insert(ext.clone()))
        .collect()
}
