//! The Rust SDK for Tweakship Remote Configs and Feature Toggles.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] that resolves named, server-managed values ("remote
//! configs") for the current [`EvaluationContext`]. Every resolution returns a [`ConfigResult`]
//! carrying a usable value and where it came from ([`LoadedFrom`]): a fresh server value, a value
//! cached in memory from an earlier fetch, or the caller-supplied default. Feature toggles are
//! remote configs of boolean type.
//!
//! Synchronous calls ([`Client::get_remote_config()`], [`Client::get_feature_toggle()`]) never
//! touch the network. Asynchronous calls fetch all requested names in a single batch request and
//! update the cache.
//!
//! ```no_run
//! # use tweakship::{Client, ClientConfig, ConfigRequest};
//! # async fn run() -> tweakship::Result<()> {
//! let client = Client::default();
//! client
//!     .configure(ClientConfig::new("https://tweakship.example.com", "project-id"))
//!     .set_context([("plan", "premium")]);
//!
//! // Preload at start-up...
//! client
//!     .get_multiple_remote_configs_async([
//!         ConfigRequest::new("banner_text", "Welcome!"),
//!         ConfigRequest::new("max_items", 10),
//!     ])
//!     .await?;
//!
//! // ...and read synchronously afterwards.
//! let banner = client.get_remote_config("banner_text", "Welcome!");
//! # Ok(())
//! # }
//! ```
//!
//! # Transport
//!
//! Requests are sent through a [`RemoteFetcher`]. [`HttpFetcher`] is used by default; any async
//! closure `(url, body) -> Result<EvaluateResponse>` can be plugged in instead.
//!
//! # Error Handling
//!
//! Only two errors fail a call: using the client before [`Client::configure()`]
//! ([`Error::NotConfigured`]) and a malformed JSON value sent by the server
//! ([`Error::InvalidJsonValue`]). All other failures (network errors, names unknown to the server,
//! server-side evaluation errors) are compensated with the cached or default value and reported in
//! [`ConfigResult::error`].
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages under the `tweakship` target. Consider integrating a `log`-compatible logger
//! implementation for better visibility into SDK operations.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod cache;
mod client;
mod config;
mod context;
mod error;
mod eval;
mod fetcher;
mod value;
mod wire;

pub use client::{Client, ConfigRequest, ConfigResult, LoadedFrom};
pub use config::ClientConfig;
pub use context::{AttributeValue, ContextValue, EvaluationContext};
pub use error::{Error, EvaluationError, Result};
pub use fetcher::{HttpFetcher, RemoteFetcher};
pub use value::{ConfigValue, ValueType};
pub use wire::{EvaluateData, EvaluateRequest, EvaluateResponse, EvaluationResult, Outcome, TryParse};
