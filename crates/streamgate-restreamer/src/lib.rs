//! Client for the datarhei Restreamer control plane.
//!
//! - [`session`]: token cell with single-flight login/refresh
//! - [`client`]: process CRUD, state and commands, retried once on 401
//! - [`ingest`]: dashboard-compatible process definitions for RTSP sources
//! - [`validate`]: source URL and display name checks
//!
//! ```no_run
//! use streamgate_restreamer::{build_ingest_config, ClientConfig, IngestSpec, RestreamerClient};
//!
//! # async fn run() -> streamgate_common::Result<()> {
//! let client = RestreamerClient::new(ClientConfig::new("http://restreamer:8080", "admin", "secret"));
//! let spec = IngestSpec::new("rtsp://cam.local/live", "Front door", client.base_url());
//! let process = client.create_process(&build_ingest_config(&spec)).await?;
//! println!("created {}", process.id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod ingest;
pub mod jwt;
pub mod session;
pub mod types;
pub mod validate;

pub use client::{ClientConfig, RestreamerClient, SharedClient, DEFAULT_TIMEOUT};
pub use ingest::{build_ingest_config, build_ui_metadata, IngestSpec};
pub use session::{AuthBackend, Session, TokenPair};
pub use types::{Command, Process, ProcessConfig, ProcessState, UiMetadata, UI_METADATA_KEY};
pub use validate::{validate_display_name, validate_source_url};
