use color_eyre::Result;
use std::path::Path;
use tempfile::TempDir;

use filestats_app::FileStatsService;
use filestats_config::{Overrides, Settings};
use filestats_models::{FileDescriptor, Locale, UserId};

fn settings_for(db: &Path, language: &str) -> Settings {
    let overrides = Overrides {
        database_path: Some(db.to_path_buf()),
        language: Some(language.to_string()),
        debug: false,
    };
    Settings {
        max_connections: 4,
        ..Settings::default()
    }
    .resolve(|_| None, &overrides)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_events_from_many_users_survive_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db = temp_dir.path().join("file_statistics.db");
    let settings = settings_for(&db, "en");

    {
        let service = FileStatsService::from_settings(&settings).await?;
        let mut handles = Vec::new();
        for user in 1..=4i64 {
            for i in 0..10i64 {
                let service = service.clone();
                handles.push(tokio::spawn(async move {
                    let name = if i % 2 == 0 { "clip.mp4" } else { "notes.txt" };
                    service
                        .record_file_event(UserId(user), &FileDescriptor::named(name).with_size(user * 100))
                        .await
                }));
            }
        }
        for handle in handles {
            handle.await??;
        }
        assert_eq!(service.user_count().await?, 4);
    }

    let service = FileStatsService::from_settings(&settings).await?;
    for user in 1..=4i64 {
        let record = service.stats(UserId(user)).await?;
        assert_eq!(record.file_count, 10);
        assert_eq!(record.total_size, u64::try_from(user * 1000)?);
        assert_eq!(record.streamable_count, 5);
        assert_eq!(record.extension_counts.get("video"), Some(&5));
        assert_eq!(record.extension_counts.get("document"), Some(&5));
    }
    Ok(())
}

#[tokio::test]
async fn test_configured_language_drives_default_report() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = settings_for(&temp_dir.path().join("stats.db"), "it_IT.UTF-8");
    let service = FileStatsService::from_settings(&settings).await?;
    assert_eq!(service.default_locale(), &Locale::parse("it-IT"));

    service
        .record_file_event(UserId(9), &FileDescriptor::named("song.mp3").with_size(1536))
        .await?;

    let rendered = service.query_stats(UserId(9), None).await?;
    assert!(!rendered.locale_fallback);
    assert!(rendered.text.contains("Dimensione totale dei file: 1,50 KB"));

    let fallback = service.query_stats(UserId(9), Some(&Locale::parse("ja"))).await?;
    assert!(fallback.locale_fallback);
    assert!(fallback.text.contains("Total file size: 1.50 KB"));
    Ok(())
}

#[tokio::test]
async fn test_reset_clears_totals_and_ignore_list() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = settings_for(&temp_dir.path().join("stats.db"), "en");
    let service = FileStatsService::from_settings(&settings).await?;
    let user = UserId(12);

    service.ignore_extensions(user, &["tmp"]).await?;
    service
        .record_archive_event(
            user,
            &FileDescriptor::named("bundle.zip").with_size(900),
            &[
                FileDescriptor::named("a.tmp").with_size(300),
                FileDescriptor::named("b.flac").with_size(700),
            ],
        )
        .await?;
    assert!(service.has_statistics(user).await?);

    assert_eq!(service.stats(user).await?.file_count, 1);

    service.reset_stats(user).await?;
    assert!(!service.has_statistics(user).await?);
    assert!(service.ignored_extensions(user).await?.is_empty());

    let record = service
        .record_file_event(user, &FileDescriptor::named("a.tmp").with_size(300))
        .await?;
    assert_eq!(record.extension_counts.get("tmp"), Some(&1));
    Ok(())
}
