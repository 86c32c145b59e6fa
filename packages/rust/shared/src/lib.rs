//! Shared types, error model, and configuration for newsdesk.
//!
//! This crate is the foundation depended on by all other newsdesk crates.
//! It provides:
//! - [`NewsdeskError`] : the unified error type
//! - Domain types ([`SourceDescriptor`], [`RawEntry`], [`NewsRecord`], [`Watermark`])
//! - Configuration ([`AppConfig`], [`PipelineSettings`], config loading)
//! - Timestamp normalization and text helpers

pub mod config;
pub mod error;
pub mod text;
pub mod time;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserConfig, DEFAULT_USER_AGENT, DISCLOSURE_LANDING_URL, DISCLOSURE_ORIGIN, HttpConfig, LlmConfig, PipelineConfig,
    PipelineSettings, SchedulerConfig, StorageConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_api_key,
};
pub use error::{NewsdeskError, Result};
pub use text::{clean_text, is_challenge_page, record_id, strip_html, truncate_chars};
pub use time::{normalize_timestamp, parse_timestamp};
pub use types::{
    AnalysisAnnotation, Attachment, Category, EntryPayload, ExtractionResult, ExtractionStrategy,
    NewsRecord, NewsStats, NewsStatus, RawEntry, Sentiment, SourceDescriptor, SourceType,
    Watermark, WatermarkMap,
};
