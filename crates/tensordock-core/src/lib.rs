//! # tensordock-core
//!
//! Request/response plumbing for the TensorDock GPU marketplace API.
//!
//! Every marketplace operation flows through this crate: request fields are
//! form-encoded, sent over HTTP, and the backend's replies are normalized into a
//! canonical envelope before any typed decoding happens.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy shared by all marketplace crates
//! - [`config`] - Client configuration file and API credentials
//! - [`form`] - Form/query encoding of request descriptors
//! - [`normalize`] - Correction of known backend response defects
//! - [`envelope`] - Canonical envelope and typed replies
//! - [`client`] - HTTP transport with optional wire dumps

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod form;
pub mod normalize;

// Re-export commonly used types
pub use config::{Credentials, MarketplaceConfig};
pub use envelope::{ApplicationFailure, Envelope, Reply};
pub use error::{Error, Result};
pub use form::FormBody;
