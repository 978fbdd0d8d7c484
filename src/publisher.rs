//! Light publisher module for delivering colors to the LED controller.
//!
//! Serializes a color into the controller's JSON wire format and POSTs it.
//! Delivery is fire-and-forget: any HTTP status is accepted, transport
//! failures are reported to the caller for logging, and nothing is retried
//! within a tick.

use crate::color::Rgb;
use crate::error::PublishError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Wire format of a controller state update: a single segment carrying a
/// single color, `{"seg":[{"col":[[R,G,B]]}]}`.
#[derive(Debug, Serialize)]
struct StateUpdate {
    seg: Vec<Segment>,
}

#[derive(Debug, Serialize)]
struct Segment {
    col: Vec<[u8; 3]>,
}

impl StateUpdate {
    fn single_color(rgb: Rgb) -> Self {
        Self {
            seg: vec![Segment {
                col: vec![[rgb.r, rgb.g, rgb.b]],
            }],
        }
    }
}

/// Delivers corrected colors to the light controller.
#[async_trait]
pub trait LightPublisher {
    /// Send one color. A transport-level failure returns [`PublishError`];
    /// the sampling loop logs it and moves on, relying on the next tick's
    /// change detection for the retry.
    async fn publish(&self, rgb: Rgb) -> Result<(), PublishError>;
}

/// HTTP implementation targeting a WLED-style JSON API.
pub struct WledHttpPublisher {
    client: reqwest::Client,
    url: String,
}

impl WledHttpPublisher {
    /// Create a publisher for the given endpoint URL.
    ///
    /// The request timeout bounds every POST so a hung controller cannot
    /// stall the sampling cadence.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PublishError::ClientBuild)?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// The configured endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LightPublisher for WledHttpPublisher {
    async fn publish(&self, rgb: Rgb) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.url)
            .json(&StateUpdate::single_color(rgb))
            .send()
            .await
            .map_err(|source| PublishError::Transport {
                url: self.url.clone(),
                source,
            })?;

        // Fire-and-forget: the response body is never parsed and no status
        // is treated as failure, but a complaining controller is worth a
        // line in the log.
        let status = response.status();
        if !status.is_success() {
            warn!("light controller answered HTTP {} for color {}", status, rgb);
        }
        Ok(())
    }
}
