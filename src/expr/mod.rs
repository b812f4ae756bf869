// ABOUTME: Expression trees and their partial evaluation.
// ABOUTME: Evaluation yields a value or the configuration points still missing.

mod context;
mod error;
mod evaluation;
mod expression;
mod point;
mod value;

pub use context::EvalContext;
pub use error::EvalError;
pub use evaluation::{Evaluation, PendingPoints};
pub use expression::{Args, Atom, Expression};
pub use point::{ConfigPoint, PointKind};
pub use value::{Value, ValueKind};
