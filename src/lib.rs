//! Streamgate - stream-ingest gateway
//!
//! This library crate exposes the server, proxy and configuration for
//! integration testing and the binary.

pub mod config;
pub mod proxy;
pub mod server;
