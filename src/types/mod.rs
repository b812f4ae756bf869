// ABOUTME: Type-safe identifiers and shared domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod dns;
mod environment;
mod id;
mod service_ref;

pub use dns::{sanitize_label, sanitize_subdomain};
pub use environment::Environment;
pub use id::{DeploymentId, EnvironmentId, Id};
pub use service_ref::ServiceRef;
