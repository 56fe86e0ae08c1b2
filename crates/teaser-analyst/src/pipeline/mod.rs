//! Teaser lifecycle: the processing controller and the service around it.

pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;
pub mod service;

pub use config::PipelineConfig;
pub use context::RunContext;
pub use error::{PipelineError, PipelineWarning};
pub use progress::{
    BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter, RunStatus, TeaserPhase,
    TeaserProgressEvent,
};
pub use runner::Pipeline;
pub use service::{TeaserService, CANCELLED_MESSAGE};
