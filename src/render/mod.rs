//! Equation rendering.
//!
//! - [`Renderer`]: the cache-backed pipeline (sync and async)
//! - [`RenderOptions`]: explicit per-call configuration
//! - [`RenderSession`]: per-consumer single-flight state machine

mod options;
mod pipeline;
mod session;

pub use options::{ErrorDisplayMode, RenderOptions};
pub use pipeline::Renderer;
pub use session::{RenderOutcome, RenderSession, RenderTicket, SessionState};

use thiserror::Error;

use crate::engine::ConversionError;
use crate::image::MaterializeError;
use crate::svg::ArtifactError;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The call's options are unusable; nothing was rendered.
    #[error("invalid render options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Engine(#[from] ConversionError),
    #[error("bitmap materialization failed: {0}")]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("render task failed: {0}")]
    Join(String),
}
