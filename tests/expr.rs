// ABOUTME: Integration tests for expression evaluation through the function registry.
// ABOUTME: Covers config lookup, pending points, custom functions and service definitions.

mod support;

use async_trait::async_trait;
use mora::expr::{Args, EvalContext, EvalError, Evaluation, Expression, PointKind, Value};
use mora::function::{Arity, ExpressionFunction, FunctionRegistry};
use mora::plan::{EnvValue, Resolution, ServiceConfig, WingmanSpec};
use mora::state::{State, StateConfig};
use mora::types::ServiceRef;
use support::{config, config_in, ident, point, service_ref, string};

fn state_with(configs: Vec<StateConfig>) -> State {
    State {
        configs,
        service_index: 0,
    }
}

/// Uppercases its single string argument.
struct Upper;

#[async_trait]
impl ExpressionFunction for Upper {
    fn arity(&self) -> Arity {
        Arity::exactly(1)
    }

    async fn evaluate(
        &self,
        cx: &EvalContext<'_>,
        args: Args<'_>,
    ) -> Result<Evaluation, EvalError> {
        match args.evaluate(cx, 0).await? {
            Evaluation::Resolved(value) => Ok(Evaluation::Resolved(Value::String(
                value.into_string()?.to_uppercase(),
            ))),
            pending => Ok(pending),
        }
    }
}

// =============================================================================
// Atoms and calls
// =============================================================================

/// Test: Atoms evaluate to their literal values.
#[tokio::test]
async fn atoms_evaluate_to_literals() {
    let registry = FunctionRegistry::with_builtins();
    let state = State::default();
    let cx = EvalContext::new("app", &state, &[], &registry);

    assert_eq!(
        string("hi").evaluate(&cx).await.unwrap(),
        Evaluation::Resolved(Value::String("hi".into()))
    );
    assert_eq!(
        Expression::number("42").evaluate(&cx).await.unwrap(),
        Evaluation::Resolved(Value::Integer(42))
    );
    assert_eq!(
        ident("x").evaluate(&cx).await.unwrap(),
        Evaluation::Resolved(Value::Identifier("x".into()))
    );
}

/// Test: A single-element list evaluates as its atom, not as a call.
#[tokio::test]
async fn single_element_list_is_its_atom() {
    let registry = FunctionRegistry::with_builtins();
    let state = State::default();
    let cx = EvalContext::new("app", &state, &[], &registry);

    let expr = Expression::List(vec![string("solo")]);
    assert_eq!(
        expr.evaluate(&cx).await.unwrap(),
        Evaluation::Resolved(Value::String("solo".into()))
    );
}

/// Test: Malformed numbers, empty lists and unknown functions are errors.
#[tokio::test]
async fn malformed_expressions_fail() {
    let registry = FunctionRegistry::with_builtins();
    let state = State::default();
    let cx = EvalContext::new("app", &state, &[], &registry);

    assert!(matches!(
        Expression::number("4x").evaluate(&cx).await,
        Err(EvalError::MalformedNumber(_))
    ));
    assert!(matches!(
        Expression::List(vec![]).evaluate(&cx).await,
        Err(EvalError::EmptyList)
    ));
    assert!(matches!(
        Expression::call("nope", [string("x")]).evaluate(&cx).await,
        Err(EvalError::UnknownFunction(name)) if name == "nope"
    ));
}

/// Test: Argument counts are checked before the function runs.
#[tokio::test]
async fn arity_is_enforced() {
    let registry = FunctionRegistry::with_builtins();
    let state = State::default();
    let cx = EvalContext::new("app", &state, &[], &registry);

    let err = Expression::call("service", [ident("only-one")])
        .evaluate(&cx)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EvalError::InvalidArguments { ref function, found: 1, .. } if function == "service"
    ));
}

/// Test: `service` builds a service reference.
#[tokio::test]
async fn service_function_builds_reference() {
    let registry = FunctionRegistry::with_builtins();
    let state = State::default();
    let cx = EvalContext::new("app", &state, &[], &registry);

    assert_eq!(
        service_ref("db", "postgres").evaluate(&cx).await.unwrap(),
        Evaluation::Resolved(Value::ServiceReference(ServiceRef::new("db", "postgres")))
    );
}

// =============================================================================
// Configuration lookup
// =============================================================================

/// Test: A declared but unset point leaves the evaluation pending.
#[tokio::test]
async fn declared_point_is_pending() {
    let registry = FunctionRegistry::with_builtins();
    let state = State::default();
    let declared = vec![point("app", "token", PointKind::Secret)];
    let cx = EvalContext::new("app", &state, &declared, &registry);

    match config("token").evaluate(&cx).await.unwrap() {
        Evaluation::Pending(points) => {
            assert_eq!(points.len(), 1);
            assert_eq!(points.head, declared[0]);
        }
        other => panic!("expected pending, got {other:?}"),
    }
}

/// Test: Values in state resolve, secrets by name.
#[tokio::test]
async fn state_values_resolve() {
    let registry = FunctionRegistry::with_builtins();
    let state = state_with(vec![
        StateConfig::new("app", "greeting", PointKind::String, "hello"),
        StateConfig::new("app", "token", PointKind::Secret, "app-token"),
    ]);
    let cx = EvalContext::new("app", &state, &[], &registry);

    assert_eq!(
        config("greeting").evaluate(&cx).await.unwrap(),
        Evaluation::Resolved(Value::String("hello".into()))
    );
    assert_eq!(
        config("token").evaluate(&cx).await.unwrap(),
        Evaluation::Resolved(Value::Secret("app-token".into()))
    );
}

/// Test: The two-argument form reads another module's point.
#[tokio::test]
async fn config_reads_other_module() {
    let registry = FunctionRegistry::with_builtins();
    let state = state_with(vec![StateConfig::new(
        "db",
        "host",
        PointKind::String,
        "db.internal",
    )]);
    let cx = EvalContext::new("app", &state, &[], &registry);

    assert_eq!(
        config_in("db", "host").evaluate(&cx).await.unwrap(),
        Evaluation::Resolved(Value::String("db.internal".into()))
    );
}

/// Test: An undeclared point with no value is an error, not a pending point.
#[tokio::test]
async fn undeclared_point_fails() {
    let registry = FunctionRegistry::with_builtins();
    let state = State::default();
    let cx = EvalContext::new("app", &state, &[], &registry);

    assert!(matches!(
        config("missing").evaluate(&cx).await,
        Err(EvalError::UndeclaredConfig { ref module, ref identifier })
            if module == "app" && identifier == "missing"
    ));
}

// =============================================================================
// Registration
// =============================================================================

/// Test: Registered functions take pending arguments through untouched.
#[tokio::test]
async fn custom_function_propagates_pending() {
    let registry = FunctionRegistry::with_builtins();
    registry.register("upper", Upper);
    let declared = vec![point("app", "name", PointKind::String)];

    let empty = State::default();
    let cx = EvalContext::new("app", &empty, &declared, &registry);
    let expr = Expression::call("upper", [config("name")]);
    assert!(expr.evaluate(&cx).await.unwrap().is_pending());

    let state = state_with(vec![StateConfig::new("app", "name", PointKind::String, "mora")]);
    let cx = EvalContext::new("app", &state, &declared, &registry);
    assert_eq!(
        expr.evaluate(&cx).await.unwrap(),
        Evaluation::Resolved(Value::String("MORA".into()))
    );
}

/// Test: Registering an existing name replaces it.
#[tokio::test]
async fn reregistering_replaces_function() {
    let registry = FunctionRegistry::with_builtins();
    registry.register("service", Upper);
    let state = State::default();
    let cx = EvalContext::new("app", &state, &[], &registry);

    assert_eq!(
        Expression::call("service", [string("x")])
            .evaluate(&cx)
            .await
            .unwrap(),
        Evaluation::Resolved(Value::String("X".into()))
    );
}

// =============================================================================
// Service definitions
// =============================================================================

fn service_config(env: Vec<(&str, Expression)>) -> ServiceConfig {
    ServiceConfig {
        module_name: "app".into(),
        service_name: "web".into(),
        image: config("image"),
        command: Some(string("serve --port 80 'two words'")),
        env: env
            .into_iter()
            .map(|(name, value)| mora::plan::EnvSpec {
                name: name.into(),
                value,
            })
            .collect(),
        wingman: None,
    }
}

/// Test: Every missing point of a service is reported at once, without duplicates.
#[tokio::test]
async fn service_reports_all_pending_points() {
    let registry = FunctionRegistry::with_builtins();
    let state = State::default();
    let declared = vec![
        point("app", "image", PointKind::String),
        point("app", "token", PointKind::Secret),
    ];
    let cx = EvalContext::new("app", &state, &declared, &registry).with_service("web");

    let svc = service_config(vec![("TOKEN", config("token")), ("AGAIN", config("token"))]);
    match svc.evaluate(&cx).await.unwrap() {
        Resolution::Pending(points) => {
            let ids: Vec<&str> = points.iter().map(|p| p.identifier.as_str()).collect();
            assert_eq!(ids, vec!["image", "token"]);
        }
        Resolution::Ready(def) => panic!("expected pending, got {def:?}"),
    }
}

/// Test: A resolved service splits its command and maps secrets to references.
#[tokio::test]
async fn service_resolves_when_configured() {
    let registry = FunctionRegistry::with_builtins();
    let state = state_with(vec![
        StateConfig::new("app", "image", PointKind::String, "nginx:1"),
        StateConfig::new("app", "token", PointKind::Secret, "app-token"),
    ]);
    let cx = EvalContext::new("app", &state, &[], &registry).with_service("web");

    let svc = service_config(vec![("TOKEN", config("token")), ("MODE", string("prod"))]);
    let Resolution::Ready(def) = svc.evaluate(&cx).await.unwrap() else {
        panic!("expected a ready definition");
    };
    assert_eq!(def.image, "nginx:1");
    assert_eq!(def.command, vec!["serve", "--port", "80", "two words"]);
    assert_eq!(def.env[0].value, EnvValue::Secret("app-token".into()));
    assert_eq!(def.env[1].value, EnvValue::Literal("prod".into()));
}

/// Test: Non-string env values fail with the field named.
#[tokio::test]
async fn env_must_be_string_or_secret() {
    let registry = FunctionRegistry::with_builtins();
    let state = state_with(vec![StateConfig::new(
        "app",
        "image",
        PointKind::String,
        "nginx:1",
    )]);
    let cx = EvalContext::new("app", &state, &[], &registry).with_service("web");

    let svc = service_config(vec![("PORT", Expression::number("80"))]);
    let err = svc.evaluate(&cx).await.unwrap_err();
    assert!(matches!(&err, EvalError::InField { field, .. } if field == "env[PORT]"));
    assert!(matches!(err.root(), EvalError::UnexpectedKind { .. }));
}

/// Test: An unterminated quote in the command is an evaluation error.
#[tokio::test]
async fn unterminated_command_quote_fails() {
    let registry = FunctionRegistry::with_builtins();
    let state = state_with(vec![StateConfig::new(
        "app",
        "image",
        PointKind::String,
        "nginx:1",
    )]);
    let cx = EvalContext::new("app", &state, &[], &registry).with_service("web");

    let mut svc = service_config(vec![]);
    svc.command = Some(string("echo 'oops"));
    let err = svc.evaluate(&cx).await.unwrap_err();
    assert!(matches!(err.root(), EvalError::MalformedCommand(_)));
}

/// Test: Wingman images resolve separately from the service.
#[tokio::test]
async fn wingman_image_evaluates_independently() {
    let registry = FunctionRegistry::with_builtins();
    let state = State::default();
    let declared = vec![point("app", "image", PointKind::String)];
    let cx = EvalContext::new("app", &state, &declared, &registry).with_service("web");

    let mut svc = service_config(vec![]);
    assert_eq!(svc.evaluate_wingman(&cx).await.unwrap(), None);

    svc.wingman = Some(WingmanSpec {
        image: string("wingman:1"),
    });
    match svc.evaluate_wingman(&cx).await.unwrap() {
        Some(Resolution::Ready(def)) => assert_eq!(def.image, "wingman:1"),
        other => panic!("expected a ready wingman, got {other:?}"),
    }
}
