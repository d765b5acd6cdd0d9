//! Top-level failure taxonomy.
//!
//! Only two classes of failure surface as process errors: the browser
//! engine being unavailable at setup time, and the final record not being
//! writable. Everything in between degrades the completeness of the record
//! rather than the success of the run.

use thiserror::Error;

/// The browser engine could not be started at all. Nothing was extracted.
#[derive(Debug, Error)]
#[error("browser setup failed: {0}")]
pub struct SetupError(pub String);
