// ABOUTME: Tri-state evaluation result and a collector for pending points.
// ABOUTME: A pending evaluation never carries a usable value.

use nonempty::NonEmpty;

use super::{ConfigPoint, EvalError, Value};

/// Outcome of a successful evaluation: either a value, or the configuration
/// points that must be supplied before a value can exist.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Resolved(Value),
    Pending(NonEmpty<ConfigPoint>),
}

impl Evaluation {
    pub fn pending(point: ConfigPoint) -> Self {
        Evaluation::Pending(NonEmpty::new(point))
    }

    /// Combine a value with points reported alongside it. Points win.
    pub fn from_parts(value: Value, points: Vec<ConfigPoint>) -> Self {
        match NonEmpty::from_vec(points) {
            Some(points) => Evaluation::Pending(points),
            None => Evaluation::Resolved(value),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Evaluation::Pending(_))
    }

    /// Require a value. Used where a position can never wait on input.
    pub fn force(self, position: &'static str) -> Result<Value, EvalError> {
        match self {
            Evaluation::Resolved(value) => Ok(value),
            Evaluation::Pending(points) => Err(EvalError::UnexpectedPending {
                position,
                count: points.len(),
            }),
        }
    }
}

/// Collects pending points across several evaluations, merging duplicates.
#[derive(Debug, Default)]
pub struct PendingPoints {
    points: Vec<ConfigPoint>,
}

impl PendingPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the value out of an evaluation, or record its points.
    pub fn resolve(&mut self, evaluation: Evaluation) -> Option<Value> {
        match evaluation {
            Evaluation::Resolved(value) => Some(value),
            Evaluation::Pending(points) => {
                self.extend(points);
                None
            }
        }
    }

    pub fn push(&mut self, point: ConfigPoint) {
        let known = self
            .points
            .iter()
            .any(|p| p.matches(&point.module_name, &point.identifier));
        if !known {
            self.points.push(point);
        }
    }

    pub fn extend(&mut self, points: impl IntoIterator<Item = ConfigPoint>) {
        for point in points {
            self.push(point);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_pending(self) -> Option<NonEmpty<ConfigPoint>> {
        NonEmpty::from_vec(self.points)
    }
}
