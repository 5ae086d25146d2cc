//! Shared types, error model, and configuration for feedmill.
//!
//! This crate is the foundation depended on by all other feedmill crates.
//! It provides:
//! - [`FeedmillError`] — the unified error type
//! - Domain types ([`ContentRecord`], [`ContentType`], [`RecordId`])
//! - Configuration ([`AppConfig`], [`IngestConfig`], config loading)
//! - Text helpers for slugs and summaries ([`text`])

pub mod config;
pub mod error;
pub mod text;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CatalogConfig, CatalogSettings, FetchSettings, IngestConfig, NotifyConfig,
    PublishConfig, PublishWindow, RankingSettings, RankingsConfig, RunLogConfig, StorageConfig,
    SummariesConfig, SummarySettings, SyndicationConfig, SyndicationSettings, TopicSettings,
    TopicsConfig, catalog_api_key, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{FeedmillError, Result};
pub use types::{
    ContentRecord, ContentType, ImageRef, MAX_RELATED_ENTITIES, MAX_RELATED_WORKS, RecordId,
    SUMMARY_MAX_CHARS, SYNTHETIC_SCHEME, UpsertStatus, synthetic_uri,
};
