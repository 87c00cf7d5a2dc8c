//! # sforge-client
//!
//! Transport infrastructure shared by the sforge crates.
//!
//! This crate provides:
//! - The [`Transport`] seam every SOAP call goes through
//! - A reqwest-backed [`HttpTransport`] with bounded per-request timeouts
//! - Response decoding of SOAP envelopes into a uniform [`soap::Node`] tree
//! - XML escaping for values placed into request envelopes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │  (sforge-auth login, sforge-metadata jobs)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Transport (trait)                        │
//! │  - SoapRequest in, SoapResponse out                         │
//! │  - HttpTransport in production, fixtures in tests           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    soap::Envelope                           │
//! │  - Header/Body split, faults, debug log side-channel        │
//! │  - Every child key decoded as an ordered sequence           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sforge_client::{ClientConfig, HttpTransport, SoapRequest, Transport};
//! use sforge_client::soap::Envelope;
//!
//! let transport = HttpTransport::new(ClientConfig::default())?;
//! let response = transport
//!     .send(SoapRequest::new(url, "checkDeployStatus", body))
//!     .await?;
//! let envelope = Envelope::decode(&response.body)?;
//! let result = envelope.result("checkDeployStatus")?;
//! ```

mod config;
mod error;
pub mod security;
pub mod soap;
mod transport;

pub use config::{ClientConfig, ClientConfigBuilder, CompressionConfig};
pub use error::{Error, ErrorKind, Result};
pub use transport::{HttpTransport, SoapRequest, SoapResponse, Transport};

/// Default Metadata API version
pub const DEFAULT_API_VERSION: &str = "62.0";

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("sforge/", env!("CARGO_PKG_VERSION"));
