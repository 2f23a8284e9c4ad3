//! Error types shared by capture ingestion and configuration loading.
use std::path::PathBuf;
use thiserror::Error;

/// Fatal: the capture file could not be opened or its framing is broken.
#[derive(Error, Debug)]
pub enum CaptureReadError {
    #[error("cannot open capture {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("capture framing error: {0}")]
    Framing(String),
}

/// Non-fatal: why a single frame (or its TLS/DNS contribution) was dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeSkip {
    #[error("unsupported link type {0}")]
    UnsupportedLink(i32),

    #[error("link/network layer: {0}")]
    Link(String),

    #[error("not an IP frame")]
    NotIp,

    #[error("no TCP or UDP header")]
    NoTransport,

    #[error("malformed TLS: {0}")]
    MalformedTls(&'static str),

    #[error("malformed DNS: {0}")]
    MalformedDns(&'static str),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
