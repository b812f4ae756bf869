// ABOUTME: Deployment execution: resumable, cancellable passes over an ordered plan.
// ABOUTME: Exports the engine, its settings, outcomes and error types.

mod configure;
mod engine;
mod error;
mod pass;
mod watcher;

pub use configure::{ConfigSubmission, ConfigValue};
pub use engine::{Engine, EngineSettings, PassOutcome};
pub use error::{ConfigureError, PassError, PassErrorKind, SubmitError};
