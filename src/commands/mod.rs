// ABOUTME: Command module aggregator for the mora CLI.
// ABOUTME: Re-exports the submit, configure and inspection command handlers.

mod configure;
mod inspect;
mod submit;
mod workspace;

pub use configure::{configure, resume};
pub use inspect::{cancel, list, status};
pub use submit::submit;
pub use workspace::open_engine;
