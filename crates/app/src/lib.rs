mod service;

pub use service::FileStatsService;
