mod settings;

pub use settings::{ENV_DATABASE_FILE, ENV_DEBUG, ENV_LANGUAGE, Overrides, Settings, parse_flag};
