//! Consent-gated analytics core for a cryptocurrency wallet application.
//!
//! This library is the single gatekeeper between application code and a
//! vendor event-ingestion SDK. It owns the user's telemetry consent state,
//! a stable pseudonymous installation identifier, and the bookkeeping for
//! GDPR/CCPA deletion regulations. Everything user-facing (screens, modals,
//! navigation) lives in the host application and calls into this crate.
//!
//! # Usage
//!
//! The client is built from injected collaborators so the vendor SDK and
//! the device preference store stay swappable and testable:
//!
//! ```ignore
//! use std::sync::Arc;
//! use wallet_metrics::client::MetricsClient;
//! use wallet_metrics::config::MetricsConfig;
//!
//! // Setup the client. Credentials are resolved by the host (dev vs. prod)
//! // before construction.
//! let metrics = MetricsClient::builder()
//!     .with_sink(sink)
//!     .with_store(store)
//!     .with_config(MetricsConfig::new(deletion_token)?)
//!     .build()?;
//!
//! // Load persisted state in the background; construction never blocks on
//! // I/O. Calls made before this resolves observe the disabled defaults.
//! let background = metrics.clone();
//! tokio::spawn(async move { background.init().await });
//!
//! // Consent is explicit. Nothing identified is emitted until the user
//! // opts in.
//! metrics.enable().await;
//! metrics.track_event("Wallet Opened", Default::default()).await;
//!
//! // The deletion-regulation flow is the only operation that reports
//! // failure back to the UI.
//! let result = metrics.request_data_deletion().await;
//! ```
//!
//! The vendor SDK is abstracted behind the [`EventSink`] trait and the
//! device key-value storage behind the [`PreferenceStore`] trait; both come
//! with in-memory implementations for tests.
//!
//! [`EventSink`]: crate::sink::EventSink
//! [`PreferenceStore`]: crate::store::PreferenceStore

pub mod client;
pub mod config;
pub mod core;
pub mod sink;
pub mod store;
