//! Typed stream identifiers and the control-plane process id scheme.
//!
//! A stream is identified by a random UUID. The control plane knows the
//! ingest process under `restreamer-ui:ingest:<uuid>` (the convention the
//! control plane's dashboard uses), and an optional snapshot process under
//! the same id with a `_snapshot` suffix.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Prefix of every ingest process id.
pub const INGEST_PREFIX: &str = "restreamer-ui:ingest:";

/// Suffix of the snapshot process belonging to an ingest process.
pub const SNAPSHOT_SUFFIX: &str = "_snapshot";

/// Unique identifier for an ingest stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Generate a new random (version 4) stream ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Control-plane process id of the ingest process.
    pub fn ingest_process_id(&self) -> String {
        format!("{INGEST_PREFIX}{}", self.0)
    }

    /// Control-plane process id of the companion snapshot process.
    pub fn snapshot_process_id(&self) -> String {
        format!("{INGEST_PREFIX}{}{SNAPSHOT_SUFFIX}", self.0)
    }

    /// Recover the stream id from an ingest process id.
    ///
    /// Returns `None` for foreign processes and for snapshot processes.
    pub fn from_process_id(process_id: &str) -> Option<Self> {
        if !is_ingest_process_id(process_id) {
            return None;
        }
        process_id
            .strip_prefix(INGEST_PREFIX)
            .and_then(|rest| rest.parse::<Uuid>().ok())
            .map(Self)
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for StreamId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<StreamId> for Uuid {
    fn from(id: StreamId) -> Self {
        id.0
    }
}

impl std::str::FromStr for StreamId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<Uuid>()
            .map(Self)
            .map_err(|_| Error::validation("invalid stream id"))
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// True for ingest processes, false for snapshots and anything else.
pub fn is_ingest_process_id(process_id: &str) -> bool {
    process_id.starts_with(INGEST_PREFIX) && !process_id.ends_with(SNAPSHOT_SUFFIX)
}
