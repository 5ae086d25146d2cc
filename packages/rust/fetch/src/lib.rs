//! Outbound HTTP and feed decoding for feedmill sources.
//!
//! - [`retry`]: bounded retries with per-attempt deadlines
//! - [`client`]: the [`FetchClient`] every networked source goes through
//! - [`feed`]: RSS/Atom/JSON Feed parsing into [`FeedEntry`]

pub mod client;
pub mod feed;
pub mod retry;

pub use client::{FetchClient, ensure_success};
pub use feed::{FeedDialect, FeedEntry, parse_feed};
pub use retry::{AttemptError, RetryExhausted, RetryPolicy, with_retry};
