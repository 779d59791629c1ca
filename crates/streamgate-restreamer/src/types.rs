//! Wire types of the Restreamer Core API.
//!
//! Field names follow the control plane's JSON exactly. Response types are
//! decoded leniently (`#[serde(default)]`): the control plane adds fields
//! between releases and omits empty ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key under which the Restreamer dashboard stores its state.
pub const UI_METADATA_KEY: &str = "restreamer-ui";

// ---------------------------------------------------------------------------
// Process definition
// ---------------------------------------------------------------------------

/// Payload for `POST /api/v3/process`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub reference: String,
    pub input: Vec<ProcessIo>,
    pub output: Vec<ProcessIo>,
    pub options: Vec<String>,
    pub autostart: bool,
    pub reconnect: bool,
    pub reconnect_delay_seconds: u32,
    pub stale_timeout_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ProcessLimits>,
}

/// A single FFmpeg input or output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessIo {
    pub id: String,
    pub address: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup: Vec<ProcessCleanup>,
}

/// Retention rule for files an output writes to the in-memory filesystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessCleanup {
    pub pattern: String,
    pub max_files: u32,
    pub max_file_age_seconds: u32,
    pub purge_on_delete: bool,
}

/// Resource limits of a process. Zero means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessLimits {
    pub cpu_usage: f64,
    pub memory_mbytes: f64,
    pub waitfor_seconds: u32,
}

/// Process as returned by `GET`/`POST /api/v3/process`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Process {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub reference: String,
    pub input: Vec<ProcessIo>,
    pub output: Vec<ProcessIo>,
    pub options: Vec<String>,
    pub autostart: bool,
    pub reconnect: bool,
    pub reconnect_delay_seconds: u32,
    pub stale_timeout_seconds: u32,
    pub limits: Option<ProcessLimits>,
    /// Free-form metadata, keyed by application. Kept untyped: blobs written
    /// by other dashboard versions must not break decoding.
    pub metadata: Option<Value>,
}

impl Process {
    /// Human-readable name of the process.
    ///
    /// The dashboard's `meta.name` when set, else the reference, else the id.
    pub fn display_name(&self) -> &str {
        let ui_name = self
            .metadata
            .as_ref()
            .and_then(|meta| meta.get(UI_METADATA_KEY))
            .and_then(|ui| ui.pointer("/meta/name"))
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty());

        match ui_name {
            Some(name) => name,
            None if !self.reference.is_empty() => &self.reference,
            None => &self.id,
        }
    }
}

// ---------------------------------------------------------------------------
// Dashboard metadata
// ---------------------------------------------------------------------------

/// Metadata blob that makes a process visible and editable in the
/// Restreamer dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMetadata {
    pub version: String,
    pub meta: UiMeta,
    pub control: UiControl,
    pub license: String,
    pub player: UiPlayer,
    pub profiles: Vec<UiProfile>,
    pub sources: Vec<UiSource>,
    pub streams: Vec<UiStream>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiMeta {
    pub name: String,
    pub description: String,
    pub author: UiAuthor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiAuthor {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiControl {
    pub hls: UiControlHls,
    pub process: UiControlProcess,
    pub snapshot: UiControlSnapshot,
    pub limits: ProcessLimits,
    pub rtmp: UiToggle,
    pub srt: UiToggle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiControlHls {
    pub cleanup: bool,
    pub lhls: bool,
    #[serde(rename = "listSize")]
    pub list_size: u32,
    pub master_playlist: bool,
    #[serde(rename = "segmentDuration")]
    pub segment_duration: u32,
    pub storage: String,
    pub version: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiControlProcess {
    pub autostart: bool,
    pub delay: u32,
    pub low_delay: bool,
    pub reconnect: bool,
    #[serde(rename = "staleTimeout")]
    pub stale_timeout: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiControlSnapshot {
    pub enable: bool,
    pub interval: u32,
}

/// RTMP/SRT publishing switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiToggle {
    pub enable: bool,
}

/// Player embed settings; always empty for gateway-created streams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiPlayer {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiProfile {
    pub video: UiProfileTrack,
    pub audio: UiProfileTrack,
    pub custom: UiProfileCustom,
}

/// Decoder/encoder/filter settings of one track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiProfileTrack {
    pub source: u32,
    pub stream: u32,
    pub decoder: UiCodec,
    pub encoder: UiCodec,
    pub filter: UiFilter,
    /// Only present on audio tracks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coder: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiCodec {
    pub coder: String,
    pub mapping: UiCodecMapping,
    pub settings: serde_json::Map<String, Value>,
}

/// FFmpeg argument lists contributed by a codec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiCodecMapping {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<String>,
    pub global: Vec<String>,
    pub local: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiFilter {
    pub graph: String,
    pub settings: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiProfileCustom {
    pub selected: bool,
    pub stream: u32,
}

/// Input source as the dashboard's source wizard describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub inputs: Vec<UiSourceInput>,
    pub settings: serde_json::Map<String, Value>,
    pub streams: Vec<UiStream>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiSourceInput {
    pub address: String,
    /// Mix of strings and numbers, as the dashboard stores them.
    pub options: Vec<Value>,
}

/// A probed video or audio track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiStream {
    pub index: u32,
    pub stream: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_hz: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_fmt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Returned by `GET /api/v3/process/{id}/state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessState {
    /// Requested state (`start`/`stop`).
    pub order: String,
    /// Actual state (`running`, `finished`, `failed`, ...).
    pub exec: String,
    pub runtime_seconds: u64,
    pub reconnect_seconds: i64,
    pub last_logline: String,
    pub progress: ProcessProgress,
    pub memory_bytes: u64,
    pub cpu_usage: f64,
}

/// FFmpeg progress counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessProgress {
    pub inputs: Vec<ProgressIo>,
    pub outputs: Vec<ProgressIo>,
    pub frame: u64,
    pub packet: u64,
    pub fps: f64,
    pub q: f64,
    pub size_kb: u64,
    pub time: f64,
    pub bitrate_kbit: f64,
    pub speed: f64,
    pub drop: u64,
    pub dup: u64,
}

/// Progress of a single input or output track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressIo {
    pub id: String,
    pub address: String,
    pub index: u32,
    pub stream: u32,
    pub format: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub codec: String,
    pub coder: String,
    pub frame: u64,
    pub fps: f64,
    pub packet: u64,
    pub pps: f64,
    pub size_kb: u64,
    pub bitrate_kbit: f64,
    pub pix_fmt: String,
    pub q: f64,
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// Auth and commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Process command accepted by `PUT /api/v3/process/{id}/command`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Start,
    Stop,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandRequest {
    pub command: Command,
}
