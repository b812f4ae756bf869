// ABOUTME: Test support utilities.
// ABOUTME: Plan builders, an in-memory engine, fake sidecars and a canned HTTP server.

#![allow(dead_code)]

use async_trait::async_trait;
use mora::cluster::MemoryCluster;
use mora::deploy::{Engine, EngineSettings};
use mora::expr::{ConfigPoint, Evaluation, Expression, PointKind, Value};
use mora::plan::{EnvSpec, Module, ModuleConfig, ServiceSpec, Submission, WingmanSpec};
use mora::resource::ConvergeSettings;
use mora::state::State;
use mora::store::MemoryStore;
use mora::types::{Environment, ServiceRef};
use mora::wingman::protocol::FunctionRequest;
use mora::wingman::{FunctionReply, Sidecar, SidecarLocator, WingmanError, WingmanSettings};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("mora=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// =============================================================================
// Expression builders
// =============================================================================

pub fn string(s: &str) -> Expression {
    Expression::string(s)
}

pub fn ident(s: &str) -> Expression {
    Expression::identifier(s)
}

/// `(config identifier)`
pub fn config(identifier: &str) -> Expression {
    Expression::call("config", [ident(identifier)])
}

/// `(config module identifier)`
pub fn config_in(module: &str, identifier: &str) -> Expression {
    Expression::call("config", [ident(module), ident(identifier)])
}

/// `(service module service)`
pub fn service_ref(module: &str, service: &str) -> Expression {
    Expression::call("service", [ident(module), ident(service)])
}

// =============================================================================
// Plan builders
// =============================================================================

pub fn service(name: &str, image: Expression) -> ServiceSpec {
    ServiceSpec {
        name: name.to_string(),
        image,
        command: None,
        requires: Vec::new(),
        env: Vec::new(),
        wingman: None,
    }
}

pub fn requiring(mut spec: ServiceSpec, module: &str, service: &str) -> ServiceSpec {
    spec.requires.push(service_ref(module, service));
    spec
}

pub fn with_env(mut spec: ServiceSpec, name: &str, value: Expression) -> ServiceSpec {
    spec.env.push(EnvSpec {
        name: name.to_string(),
        value,
    });
    spec
}

pub fn with_command(mut spec: ServiceSpec, command: Expression) -> ServiceSpec {
    spec.command = Some(command);
    spec
}

pub fn with_wingman(mut spec: ServiceSpec, image: Expression) -> ServiceSpec {
    spec.wingman = Some(WingmanSpec { image });
    spec
}

pub fn declared(identifier: &str, kind: PointKind) -> ModuleConfig {
    ModuleConfig {
        identifier: identifier.to_string(),
        name: string(identifier),
        kind: Some(ident(&kind.to_string())),
        description: None,
    }
}

pub fn module(name: &str, services: Vec<ServiceSpec>, configs: Vec<ModuleConfig>) -> Module {
    Module {
        name: name.to_string(),
        services,
        configs,
    }
}

pub fn submission(modules: Vec<Module>) -> Submission {
    Submission { modules }
}

pub fn environment() -> Environment {
    Environment::new("alice", "dev")
}

pub fn point(module: &str, identifier: &str, kind: PointKind) -> ConfigPoint {
    ConfigPoint::new(module, identifier, kind)
}

// =============================================================================
// Engine harness
// =============================================================================

/// Settings small enough that waits finish in milliseconds.
pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        converge: ConvergeSettings {
            timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(5),
        },
        cancel_poll_interval: Duration::from_millis(10),
        wingman: WingmanSettings {
            port: 8080,
            attempts: 2,
            backoff: Duration::from_millis(5),
        },
    }
}

pub struct Harness {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub cluster: Arc<MemoryCluster>,
    pub sidecars: Arc<FakeLocator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_cluster(MemoryCluster::new())
    }

    pub fn with_cluster(cluster: MemoryCluster) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let cluster = Arc::new(cluster);
        let sidecars = Arc::new(FakeLocator::default());
        let engine = Engine::new(
            store.clone(),
            cluster.clone(),
            sidecars.clone(),
            fast_settings(),
        );
        Self {
            engine,
            store,
            cluster,
            sidecars,
        }
    }
}

// =============================================================================
// Fake sidecars
// =============================================================================

/// A sidecar that asks for fixed points until state holds them and answers
/// functions from a table.
#[derive(Default)]
pub struct FakeSidecar {
    points: Vec<ConfigPoint>,
    functions: HashMap<String, Evaluation>,
    calls: Mutex<Vec<String>>,
    modules: Mutex<Vec<String>>,
}

impl FakeSidecar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn needing(mut self, point: ConfigPoint) -> Self {
        self.points.push(point);
        self
    }

    pub fn answering(mut self, function: &str, evaluation: Evaluation) -> Self {
        self.functions.insert(function.to_string(), evaluation);
        self
    }

    pub fn answering_value(self, function: &str, value: Value) -> Self {
        self.answering(function, Evaluation::Resolved(value))
    }

    /// Function names requested so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// The module each function request was made on behalf of.
    pub fn modules(&self) -> Vec<String> {
        self.modules.lock().clone()
    }
}

#[async_trait]
impl Sidecar for FakeSidecar {
    async fn config_points(
        &self,
        _module: &str,
        state: &State,
    ) -> Result<Vec<ConfigPoint>, WingmanError> {
        Ok(self
            .points
            .iter()
            .filter(|p| !state.has_config(&p.module_name, &p.identifier))
            .cloned()
            .collect())
    }

    async fn call_function(&self, request: &FunctionRequest) -> Result<FunctionReply, WingmanError> {
        self.calls.lock().push(request.function_name.clone());
        self.modules.lock().push(request.module_name.clone());
        Ok(match self.functions.get(&request.function_name) {
            Some(evaluation) => FunctionReply::Evaluated(evaluation.clone()),
            None => FunctionReply::NotFound,
        })
    }
}

/// Sidecars registered by service. Found only once registered.
#[derive(Default)]
pub struct FakeLocator {
    sidecars: Mutex<Vec<(ServiceRef, Arc<FakeSidecar>)>>,
}

impl FakeLocator {
    pub fn register(&self, module: &str, service: &str, sidecar: FakeSidecar) -> Arc<FakeSidecar> {
        let sidecar = Arc::new(sidecar);
        self.sidecars
            .lock()
            .push((ServiceRef::new(module, service), sidecar.clone()));
        sidecar
    }
}

#[async_trait]
impl SidecarLocator for FakeLocator {
    async fn find(
        &self,
        _environment: &Environment,
        service: &ServiceRef,
    ) -> Result<Option<Arc<dyn Sidecar>>, WingmanError> {
        Ok(self
            .sidecars
            .lock()
            .iter()
            .find(|(owner, _)| owner == service)
            .map(|(_, sidecar)| sidecar.clone() as Arc<dyn Sidecar>))
    }

    async fn all(
        &self,
        _environment: &Environment,
    ) -> Result<Vec<(ServiceRef, Arc<dyn Sidecar>)>, WingmanError> {
        Ok(self
            .sidecars
            .lock()
            .iter()
            .map(|(owner, sidecar)| (owner.clone(), sidecar.clone() as Arc<dyn Sidecar>))
            .collect())
    }
}

// =============================================================================
// Canned HTTP server
// =============================================================================

/// A request as the canned server received it.
#[derive(Debug, Clone)]
pub struct Received {
    pub request_line: String,
    pub body: String,
}

/// Serve one canned `(status, body)` per connection, in order.
///
/// Returns the base URL and a handle yielding every received request.
pub async fn canned_server(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<Received>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut received = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            received.push(read_request(&mut stream).await);

            let response = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                reason(status),
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        }
        received
    });

    (url, handle)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> Received {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers ended");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before body ended");
        buf.extend_from_slice(&chunk[..n]);
    }

    Received {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buf[header_end..header_end + content_length]).into_owned(),
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
