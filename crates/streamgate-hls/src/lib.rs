//! Streamgate-HLS: manifest classification and proxy rewriting
//!
//! Browsers can only play a remote HLS stream if every playlist and segment
//! request is allowed by the origin's CORS policy. Streamgate relays those
//! requests through a same-origin proxy endpoint; this crate provides the
//! pure, I/O-free half of that job.
//!
//! # Modules
//!
//! - `content` - Decide whether a response is a manifest or a media segment
//! - `rewrite` - Rewrite every URI reference in a playlist into a proxy URL
//!
//! # Examples
//!
//! ```
//! use streamgate_hls::rewrite_manifest;
//!
//! let body = b"#EXTM3U\nseg0.ts\n";
//! let out = rewrite_manifest(body, "https://origin.example.com/live/index.m3u8", "/stream-proxy");
//! assert_eq!(
//!     std::str::from_utf8(&out).unwrap(),
//!     "#EXTM3U\n/stream-proxy?url=https%3A%2F%2Forigin.example.com%2Flive%2Fseg0.ts\n"
//! );
//! ```

pub mod content;
pub mod rewrite;

pub use content::{is_manifest, HLS_MIME_TYPE, MANIFEST_EXTENSION};
pub use rewrite::{proxy_url, resolve_reference, rewrite_manifest};
