//! # sforge
//!
//! Metadata API deploy and retrieve orchestration for editor integrations.
//!
//! ## Crates
//!
//! - **sforge-client** - SOAP transport, envelope decoding, XML escaping
//! - **sforge-auth** - SOAP and OAuth login, session caching, one-shot session renewal
//! - **sforge-metadata** - Envelope building, job polling and result reports
//!
//! This crate adds [`Settings`] (JSON file plus `SF_*` environment) and the
//! [`archive`] helpers used to pack deploys and unpack retrieves.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sforge::{archive, Settings};
//! use sforge::metadata::{PackageManifest, RetrieveRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load("sforge.json")?;
//!     let client = settings.metadata_client()?;
//!
//!     let manifest = PackageManifest::new(settings.api_version.clone())
//!         .add_type("ApexClass", vec!["*".to_string()]);
//!     let report = client.retrieve(&RetrieveRequest::unpackaged(manifest)).await?;
//!
//!     if let Some(zip) = &report.zip_file {
//!         archive::extract_encoded(zip, "workspace".as_ref(), false)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
mod error;
mod settings;

// Re-export all crates for convenient access
pub use sforge_auth as auth;
pub use sforge_client as client;
pub use sforge_metadata as metadata;

pub use error::{Error, ErrorKind, Result};
pub use settings::{PollSettings, Settings};

// Re-export commonly used types at the top level
pub use sforge_auth::{Session, SessionManager};
pub use sforge_client::{ClientConfig, HttpTransport};
pub use sforge_metadata::{DeployOptions, MetadataClient, Report};
