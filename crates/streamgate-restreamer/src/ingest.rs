//! Process definitions for RTSP ingest streams.
//!
//! The generated process has the same shape the Restreamer dashboard writes
//! when a user sets up a network source by hand, so gateway-created streams
//! show up (and stay editable) in the dashboard.

use serde_json::{json, Map, Value};
use streamgate_common::StreamId;

use crate::types::{
    ProcessCleanup, ProcessConfig, ProcessIo, ProcessLimits, UiAuthor, UiCodec, UiCodecMapping,
    UiControl, UiControlHls, UiControlProcess, UiControlSnapshot, UiFilter, UiMeta, UiMetadata,
    UiPlayer, UiProfile, UiProfileCustom, UiProfileTrack, UiSource, UiSourceInput, UiToggle,
};

/// Version of the dashboard whose metadata layout is produced.
pub const UI_VERSION: &str = "1.14.0";

const SEGMENT_SECONDS: u32 = 2;
const LIST_SIZE: u32 = 6;
const RECONNECT_DELAY_SECONDS: u32 = 15;
const STALE_TIMEOUT_SECONDS: u32 = 30;
const WAITFOR_SECONDS: u32 = 5;
const SEGMENT_MAX_FILES: u32 = 12;
const SEGMENT_MAX_AGE_SECONDS: u32 = 24;
const THREAD_QUEUE_SIZE: u64 = 512;
const RTSP_TIMEOUT_MICROS: u64 = 5_000_000;

/// Everything needed to define one ingest stream.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSpec {
    pub stream_id: StreamId,
    /// RTSP(S) source address, already validated.
    pub source: String,
    /// Cosmetic name shown in the dashboard.
    pub name: String,
    /// Control-plane base URL, used for the oEmbed title.
    pub base_url: String,
}

impl IngestSpec {
    /// New spec with a freshly generated stream id.
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            stream_id: StreamId::new(),
            source: source.into(),
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_stream_id(mut self, stream_id: StreamId) -> Self {
        self.stream_id = stream_id;
        self
    }
}

/// Build the process definition for `spec`.
pub fn build_ingest_config(spec: &IngestSpec) -> ProcessConfig {
    let id = spec.stream_id.to_string();

    let input = ProcessIo {
        id: "input_0".to_string(),
        address: spec.source.clone(),
        options: strings(&[
            "-fflags",
            "+genpts",
            "-thread_queue_size",
            &THREAD_QUEUE_SIZE.to_string(),
            "-timeout",
            &RTSP_TIMEOUT_MICROS.to_string(),
            "-rtsp_transport",
            "tcp",
        ]),
        cleanup: Vec::new(),
    };

    let output = ProcessIo {
        id: "output_0".to_string(),
        address: format!("{{memfs}}/{id}_{{outputid}}.m3u8"),
        options: strings(&[
            "-dn",
            "-sn",
            "-map",
            "0:0",
            "-codec:v",
            "copy",
            "-map",
            "0:1?",
            "-codec:a",
            "copy",
            "-metadata",
            &format!("title={}/{id}/oembed.json", spec.base_url),
            "-metadata",
            "service_provider=datarhei-Restreamer",
            "-f",
            "hls",
            "-start_number",
            "0",
            "-hls_time",
            &SEGMENT_SECONDS.to_string(),
            "-hls_list_size",
            &LIST_SIZE.to_string(),
            "-hls_flags",
            "append_list+delete_segments+program_date_time+temp_file",
            "-hls_delete_threshold",
            "4",
            "-hls_segment_filename",
            &format!("{{memfs}}/{id}_{{outputid}}_%04d.ts"),
            "-master_pl_name",
            &format!("{id}.m3u8"),
            "-master_pl_publish_rate",
            "2",
            "-method",
            "PUT",
        ]),
        cleanup: vec![
            cleanup(format!("memfs:/{id}**"), 0, 0),
            cleanup(format!("memfs:/{id}_{{outputid}}.m3u8"), 0, SEGMENT_MAX_AGE_SECONDS),
            cleanup(
                format!("memfs:/{id}_{{outputid}}_**.ts"),
                SEGMENT_MAX_FILES,
                SEGMENT_MAX_AGE_SECONDS,
            ),
            cleanup(format!("memfs:/{id}.m3u8"), 0, SEGMENT_MAX_AGE_SECONDS),
        ],
    };

    ProcessConfig {
        id: spec.stream_id.ingest_process_id(),
        kind: "ffmpeg".to_string(),
        reference: id,
        input: vec![input],
        output: vec![output],
        options: strings(&["-err_detect", "ignore_err", "-y"]),
        autostart: true,
        reconnect: true,
        reconnect_delay_seconds: RECONNECT_DELAY_SECONDS,
        stale_timeout_seconds: STALE_TIMEOUT_SECONDS,
        limits: Some(limits()),
    }
}

/// Build the dashboard metadata for `spec`.
pub fn build_ui_metadata(spec: &IngestSpec) -> UiMetadata {
    UiMetadata {
        version: UI_VERSION.to_string(),
        meta: UiMeta {
            name: spec.name.clone(),
            description: "Live from earth. Powered by datarhei Restreamer.".to_string(),
            author: UiAuthor::default(),
        },
        control: UiControl {
            hls: UiControlHls {
                cleanup: true,
                lhls: false,
                list_size: LIST_SIZE,
                master_playlist: true,
                segment_duration: SEGMENT_SECONDS,
                storage: "memfs".to_string(),
                version: 3,
            },
            process: UiControlProcess {
                autostart: true,
                delay: RECONNECT_DELAY_SECONDS,
                low_delay: false,
                reconnect: true,
                stale_timeout: STALE_TIMEOUT_SECONDS,
            },
            snapshot: UiControlSnapshot {
                enable: true,
                interval: 60,
            },
            limits: limits(),
            rtmp: UiToggle::default(),
            srt: UiToggle::default(),
        },
        license: "CC BY 4.0".to_string(),
        player: UiPlayer::default(),
        profiles: vec![UiProfile {
            video: copy_track(0, &["-codec:v", "copy"], None),
            audio: copy_track(1, &["-codec:a", "copy"], Some("copy")),
            custom: UiProfileCustom::default(),
        }],
        sources: vec![network_source(spec), UiSource::default()],
        streams: Vec::new(),
    }
}

fn network_source(spec: &IngestSpec) -> UiSource {
    let settings = json!({
        "address": spec.source,
        "mode": "pull",
        "rtsp": {
            "stimeout": RTSP_TIMEOUT_MICROS,
            "udp": false,
        },
        "general": {
            "fflags": ["genpts"],
            "thread_queue_size": THREAD_QUEUE_SIZE,
            "probesize": 5_000_000,
            "analyzeduration": 5_000_000,
            "analyzeduration_http": 20_000_000,
            "analyzeduration_rtmp": 3_000_000,
            "max_probe_packets": 2500,
            "copyts": false,
            "start_at_zero": false,
            "avoid_negative_ts": "auto",
            "use_wallclock_as_timestamps": false,
        },
        "http": {
            "readNative": true,
            "forceFramerate": false,
            "framerate": 25,
            "userAgent": "",
            "referer": "",
            "http_proxy": "",
        },
        "username": "",
        "password": "",
        "push": {
            "name": spec.stream_id.to_string(),
            "type": "rtmp",
        },
    });

    UiSource {
        kind: "network".to_string(),
        inputs: vec![UiSourceInput {
            address: spec.source.clone(),
            options: vec![
                json!("-fflags"),
                json!("+genpts"),
                json!("-thread_queue_size"),
                json!(THREAD_QUEUE_SIZE),
                json!("-timeout"),
                json!(RTSP_TIMEOUT_MICROS),
                json!("-rtsp_transport"),
                json!("tcp"),
            ],
        }],
        settings: object(settings),
        streams: Vec::new(),
    }
}

fn copy_track(stream: u32, encoder_args: &[&str], coder: Option<&str>) -> UiProfileTrack {
    UiProfileTrack {
        source: 0,
        stream,
        decoder: UiCodec {
            coder: "default".to_string(),
            ..Default::default()
        },
        encoder: UiCodec {
            coder: "copy".to_string(),
            mapping: UiCodecMapping {
                local: strings(encoder_args),
                ..Default::default()
            },
            ..Default::default()
        },
        filter: UiFilter::default(),
        coder: coder.map(str::to_string),
    }
}

fn cleanup(pattern: String, max_files: u32, max_file_age_seconds: u32) -> ProcessCleanup {
    ProcessCleanup {
        pattern,
        max_files,
        max_file_age_seconds,
        purge_on_delete: true,
    }
}

fn limits() -> ProcessLimits {
    ProcessLimits {
        cpu_usage: 0.0,
        memory_mbytes: 0.0,
        waitfor_seconds: WAITFOR_SECONDS,
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
