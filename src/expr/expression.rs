// ABOUTME: Atom/list expression trees and the evaluator.
// ABOUTME: Lists call registered functions with unevaluated argument expressions.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::{EvalContext, EvalError, Evaluation, Value};

/// A structured expression as submitted in a plan.
///
/// Serialized as `{"atom": {...}}` or `{"list": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Atom(Atom),
    List(Vec<Expression>),
}

/// A leaf of an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Atom {
    Identifier(String),
    String(String),
    /// Kept as text; parsed when evaluated.
    Number(String),
}

impl Atom {
    pub fn evaluate(&self) -> Result<Value, EvalError> {
        match self {
            Atom::Identifier(name) => Ok(Value::Identifier(name.clone())),
            Atom::String(s) => Ok(Value::String(s.clone())),
            Atom::Number(text) => text
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| EvalError::MalformedNumber(text.clone())),
        }
    }
}

impl Expression {
    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Atom(Atom::Identifier(name.into()))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Expression::Atom(Atom::String(s.into()))
    }

    pub fn number(text: impl Into<String>) -> Self {
        Expression::Atom(Atom::Number(text.into()))
    }

    /// A function call: `(name args...)`.
    ///
    /// With no arguments this is a one-element list, which evaluates as the
    /// bare identifier `name` rather than calling anything.
    pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Expression>) -> Self {
        let mut items = vec![Expression::identifier(name)];
        items.extend(args);
        Expression::List(items)
    }

    /// The sole atom of a one-element list, which evaluates as that atom.
    fn trivial(items: &[Expression]) -> Option<&Atom> {
        match items {
            [Expression::Atom(atom)] => Some(atom),
            _ => None,
        }
    }

    /// Evaluate this expression, surfacing missing configuration as
    /// [`Evaluation::Pending`].
    pub fn evaluate<'a>(
        &'a self,
        cx: &'a EvalContext<'_>,
    ) -> BoxFuture<'a, Result<Evaluation, EvalError>> {
        Box::pin(async move {
            let items = match self {
                Expression::Atom(atom) => return atom.evaluate().map(Evaluation::Resolved),
                Expression::List(items) => items,
            };

            if let Some(atom) = Self::trivial(items) {
                return atom.evaluate().map(Evaluation::Resolved);
            }

            let (head, rest) = items.split_first().ok_or(EvalError::EmptyList)?;
            let name = head
                .evaluate(cx)
                .await?
                .force("function name")?
                .into_identifier()?;

            match cx.functions().call(cx, &name, Args::new(rest)).await? {
                Some(evaluation) => Ok(evaluation),
                None => Err(EvalError::UnknownFunction(name)),
            }
        })
    }

    /// Evaluate and require a value.
    pub async fn force_evaluate(
        &self,
        cx: &EvalContext<'_>,
        position: &'static str,
    ) -> Result<Value, EvalError> {
        self.evaluate(cx).await?.force(position)
    }
}

/// Positional arguments of a function call, left unevaluated so the
/// function decides what to evaluate.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    exprs: &'a [Expression],
}

impl<'a> Args<'a> {
    pub fn new(exprs: &'a [Expression]) -> Self {
        Self { exprs }
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn as_slice(&self) -> &'a [Expression] {
        self.exprs
    }

    /// Evaluate argument `index`. Missing arguments evaluate to `Null`.
    pub async fn evaluate(
        &self,
        cx: &EvalContext<'_>,
        index: usize,
    ) -> Result<Evaluation, EvalError> {
        match self.exprs.get(index) {
            Some(expr) => expr.evaluate(cx).await,
            None => Ok(Evaluation::Resolved(Value::Null)),
        }
    }

    pub async fn identifier(
        &self,
        cx: &EvalContext<'_>,
        index: usize,
    ) -> Result<String, EvalError> {
        self.evaluate(cx, index)
            .await?
            .force("identifier argument")?
            .into_identifier()
    }
}
