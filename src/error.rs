//! Error types for the GlowSync daemon.
//!
//! This module defines custom error enums for each component of the daemon,
//! providing descriptive error messages with context information.

use thiserror::Error;

/// Errors related to the initial connection to the windowing system.
///
/// These are the only fatal errors in the daemon: nothing in the sampling
/// loop can function without a display connection, so startup aborts with a
/// non-zero exit status.
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("failed to connect to the X server: {0}")]
    ConnectFailed(#[from] x11rb::errors::ConnectError),

    #[error("X server reported no screen at index {0}")]
    NoScreen(usize),
}

/// Errors related to per-tick window queries and pixel capture.
///
/// All of these are recoverable: the tick is skipped and the loop continues.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("display connection error during capture: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),

    #[error("capture request rejected, window likely destroyed: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),

    #[error("captured image has {got} bytes, expected {expected} for {width}x{height}")]
    ShortImage {
        got: usize,
        expected: usize,
        width: u32,
        height: u32,
    },

    #[error("unsupported pixel layout: {bytes_per_pixel} bytes per pixel")]
    UnsupportedFormat { bytes_per_pixel: usize },
}

/// Errors related to color averaging.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AverageError {
    #[error(
        "window {width}x{height} is smaller than the sampling stride {scale_factor} in at least one dimension"
    )]
    DegenerateGeometry {
        width: u32,
        height: u32,
        scale_factor: u32,
    },
}

/// Errors related to delivering colors to the light controller.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("failed to reach light controller at '{url}': {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors related to configuration management.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),

    #[error("failed to write configuration: {0}")]
    WriteError(#[from] std::io::Error),
}

/// Top-level daemon errors.
///
/// Per-tick capture, averaging, and publish failures never surface here;
/// they are contained inside the sampling loop. These are the startup
/// failures that abort the process.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("display error: {0}")]
    Display(#[from] DisplayError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
