//! Streamgate-Common: shared error type and identifiers.
//!
//! - **Error Handling**: one error enum covering validation, control-plane,
//!   authentication and gateway failures, with HTTP status mapping
//! - **Typed IDs**: [`StreamId`] and the control-plane process id scheme
//!   derived from it
//!
//! # Examples
//!
//! ```
//! use streamgate_common::{Error, Result, StreamId, CONTROL_PLANE, UPSTREAM};
//!
//! let id = StreamId::new();
//! assert!(id.ingest_process_id().starts_with("restreamer-ui:ingest:"));
//!
//! fn example() -> Result<()> {
//!     Err(Error::validation("stream name is required"))
//! }
//! assert_eq!(example().unwrap_err().http_status(), 400);
//!
//! let err = Error::gateway(UPSTREAM, "connection reset");
//! assert_eq!(err.public_message(), "upstream unavailable");
//! assert_eq!(Error::gateway(CONTROL_PLANE, "timeout").http_status(), 502);
//! ```

pub mod error;
pub mod ids;

pub use error::{Error, Result, CONTROL_PLANE, UPSTREAM};
pub use ids::*;
