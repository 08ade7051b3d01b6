//! Error taxonomy for device and notification failures.
//!
//! Device-side failures are all retried identically by the scheduler, so the
//! variants exist for logging fidelity rather than divergent handling: a
//! malformed payload is logged verbatim but retried just like a socket error.
//! Configuration problems are fatal at startup and ride `anyhow` instead.

use thiserror::Error;

/// Failure of a vendor device API call. Every variant is transient from the
/// scheduler's point of view.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Network or protocol level failure from the HTTP client.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The vendor API answered with a non-success status.
    #[error("vendor API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response decoded, but not into the shape we expected.
    /// The offending payload is carried verbatim for the log.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Failure surfaced by the notification gate after delivery retries are
/// exhausted. Admission rejections are not errors; they come back as
/// `SendResult::Skipped`.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("delivery failed after {attempts} attempts")]
    Delivery {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}
