use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use filestats_app::FileStatsService;
use filestats_config::Overrides;
use filestats_models::{FileDescriptor, Locale, StatsRecord, UserId};
use filestats_utils::{format_bytes, format_count};
use std::path::PathBuf;

/// Per-user file statistics: record uploads, show and reset totals
#[derive(Parser, Debug)]
#[command(
    name = "filestats",
    version,
    about = "Per-user file statistics: record uploads, show and reset totals",
    after_help = "EXAMPLES:\n    \
        filestats record --user 42 --name movie.mkv --size 1048576\n    \
        filestats archive --user 42 --name photos.zip --size 5000 --member a.jpg:3000 --member b.png:4000\n    \
        filestats stats --user 42 --locale it\n    \
        filestats ignore --user 42 .exe .log"
)]
pub struct Cli {
    /// SQLite database file (overrides DATABASE_FILE)
    #[arg(long, value_name = "FILE", global = true)]
    pub database: Option<PathBuf>,

    /// Default report language (overrides BOT_LANGUAGE)
    #[arg(short, long, value_name = "LANG", global = true)]
    pub language: Option<String>,

    /// Enable debug logging (overrides DEBUG_MODE)
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            database_path: self.database.clone(),
            language: self.language.clone(),
            debug: self.debug,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Count one uploaded file
    Record {
        #[arg(short, long, value_name = "ID")]
        user: i64,

        /// File name as sent by the user
        #[arg(short, long)]
        name: Option<String>,

        /// Stored size in bytes
        #[arg(short, long, value_name = "BYTES", allow_negative_numbers = true)]
        size: Option<i64>,

        /// Downloaded size in bytes (defaults to the stored size)
        #[arg(long, value_name = "BYTES", allow_negative_numbers = true)]
        download_size: Option<i64>,

        /// Declared MIME type
        #[arg(short, long, value_name = "TYPE")]
        mime: Option<String>,
    },

    /// Count the contents of an archive
    Archive {
        #[arg(short, long, value_name = "ID")]
        user: i64,

        /// Archive file name
        #[arg(short, long)]
        name: String,

        /// Archive size in bytes
        #[arg(short, long, value_name = "BYTES", allow_negative_numbers = true)]
        size: i64,

        /// Archive member as NAME:BYTES (can be repeated)
        #[arg(long = "member", value_name = "NAME:BYTES", value_parser = parse_member, action = clap::ArgAction::Append)]
        members: Vec<FileDescriptor>,
    },

    /// Show a user's statistics
    Stats {
        #[arg(short, long, value_name = "ID")]
        user: i64,

        /// Report language (defaults to the configured language)
        #[arg(long, value_name = "LANG")]
        locale: Option<String>,
    },

    /// Clear a user's statistics
    Reset {
        #[arg(short, long, value_name = "ID")]
        user: i64,
    },

    /// Stop counting files with these extensions
    Ignore {
        #[arg(short, long, value_name = "ID")]
        user: i64,

        #[arg(value_name = "EXT", required = true)]
        extensions: Vec<String>,
    },

    /// Count files with these extensions again
    Unignore {
        #[arg(short, long, value_name = "ID")]
        user: i64,

        #[arg(value_name = "EXT", required = true)]
        extensions: Vec<String>,
    },

    /// List the extensions a user ignores
    Ignored {
        #[arg(short, long, value_name = "ID")]
        user: i64,
    },

    /// Number of users with stored statistics
    Users,
}

fn parse_member(spec: &str) -> std::result::Result<FileDescriptor, String> {
    let (name, size) = spec
        .rsplit_once(':')
        .ok_or_else(|| format!("expected NAME:BYTES, got '{spec}'"))?;
    let size = size
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid size in '{spec}': {e}"))?;

    Ok(FileDescriptor::named(name).with_size(size))
}

fn summary(record: &StatsRecord, locale: &Locale) -> String {
    format!(
        "{} file(s), {} stored, {} downloaded",
        format_count(record.file_count, locale),
        format_bytes(record.total_size),
        format_bytes(record.total_download_size)
    )
}

/// Runs one subcommand against the service and prints its outcome.
pub async fn run(service: &FileStatsService, command: Command) -> Result<()> {
    let locale = service.default_locale().clone();

    match command {
        Command::Record {
            user,
            name,
            size,
            download_size,
            mime,
        } => {
            // Direct uploads are downloaded as-is.
            let file = FileDescriptor {
                name,
                size,
                download_size: download_size.or(size),
                mime_type: mime,
            };
            let record = service.record_file_event(UserId(user), &file).await?;
            println!("{}", summary(&record, &locale));
        }
        Command::Archive {
            user,
            name,
            size,
            members,
        } => {
            let archive = FileDescriptor::named(name).with_size(size);
            let record = service.record_archive_event(UserId(user), &archive, &members).await?;
            println!("{}", summary(&record, &locale));
        }
        Command::Stats { user, locale } => {
            let locale = locale.map(|tag| Locale::parse(&tag));
            let rendered = service.query_stats(UserId(user), locale.as_ref()).await?;
            println!("{}", rendered.text);
        }
        Command::Reset { user } => {
            let previous = service.take_stats(UserId(user)).await?;
            if !previous.is_empty() {
                println!("Statistics reset.");
            } else {
                println!("Nothing to reset.");
            }
        }
        Command::Ignore { user, extensions } => {
            let added = service.ignore_extensions(UserId(user), &extensions).await?;
            if added.is_empty() {
                println!("No new extensions ignored.");
            } else {
                println!("Now ignoring: {}", added.join(", "));
            }
        }
        Command::Unignore { user, extensions } => {
            let removed = service.unignore_extensions(UserId(user), &extensions).await?;
            if removed.is_empty() {
                println!("None of these extensions were ignored.");
            } else {
                println!("No longer ignoring: {}", removed.join(", "));
            }
        }
        Command::Ignored { user } => {
            let ignored = service.ignored_extensions(UserId(user)).await?;
            if ignored.is_empty() {
                println!("No extensions are ignored.");
            } else {
                println!("{}", ignored.join(", "));
            }
        }
        Command::Users => {
            println!("{}", format_count(u64::try_from(service.user_count().await?)?, &locale));
        }
    }

    Ok(())
}
