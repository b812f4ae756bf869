// ABOUTME: Plan construction: submitted modules become an ordered service list.
// ABOUTME: Flattens declared config points and sorts services by their dependencies.

mod command;
mod error;
mod graph;
mod service;

pub use command::split_command;
pub use error::PlanError;
pub use graph::topological_order;
pub use service::{EnvValue, EnvVar, Resolution, ServiceDefinition, WingmanDefinition};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::expr::{ConfigPoint, EvalContext, EvalError, Expression, PointKind};
use crate::function::FunctionSource;
use crate::state::State;
use crate::types::ServiceRef;

/// A deployment request: every module of the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub modules: Vec<Module>,
}

impl Submission {
    /// Parse a YAML submission. Expressions are single-key maps
    /// (`{atom: {string: x}}`), as in JSON, not YAML tags.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::with::singleton_map_recursive::deserialize(serde_yaml::Deserializer::from_str(
            yaml,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
    #[serde(default)]
    pub configs: Vec<ModuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub image: Expression,
    #[serde(default)]
    pub command: Option<Expression>,
    #[serde(default)]
    pub requires: Vec<Expression>,
    #[serde(default)]
    pub env: Vec<EnvSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wingman: Option<WingmanSpec>,
}

/// An environment variable whose value is an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSpec {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Value")]
    pub value: Expression,
}

/// Companion process deployed next to a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WingmanSpec {
    #[serde(alias = "Image")]
    pub image: Expression,
}

/// A configuration point declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(alias = "Identifier")]
    pub identifier: String,
    #[serde(alias = "Name")]
    pub name: Expression,
    #[serde(default, alias = "Kind")]
    pub kind: Option<Expression>,
    #[serde(default, alias = "Description")]
    pub description: Option<Expression>,
}

/// One node of the ordered plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceConfig {
    pub module_name: String,
    pub service_name: String,
    pub image: Expression,
    #[serde(default)]
    pub command: Option<Expression>,
    #[serde(default)]
    pub env: Vec<EnvSpec>,
    #[serde(default)]
    pub wingman: Option<WingmanSpec>,
}

/// The immutable, persisted result of plan construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Plan {
    /// Services in deploy order.
    pub services: Vec<ServiceConfig>,
    /// Every declared configuration point, flattened across modules.
    pub configs: Vec<ConfigPoint>,
}

impl Plan {
    pub fn find_config(&self, module: &str, identifier: &str) -> Option<&ConfigPoint> {
        self.configs.iter().find(|p| p.matches(module, identifier))
    }

    pub fn service(&self, index: usize) -> Option<&ServiceConfig> {
        self.services.get(index)
    }
}

/// Build the ordered plan for a submission.
///
/// Dependency declarations are evaluated against an empty state, so a
/// `requires` entry that depends on configuration is rejected.
pub async fn build_plan(
    submission: &Submission,
    functions: &dyn FunctionSource,
) -> Result<Plan, PlanError> {
    let configs = flatten_configs(submission, functions).await?;
    let empty = State::default();

    let mut nodes: Vec<(ServiceRef, &ServiceSpec)> = Vec::new();
    let mut index: HashMap<ServiceRef, usize> = HashMap::new();
    let mut modules = HashSet::new();
    for module in &submission.modules {
        if !modules.insert(module.name.as_str()) {
            return Err(PlanError::DuplicateModule(module.name.clone()));
        }
        for service in &module.services {
            let service_ref = ServiceRef::new(&module.name, &service.name);
            if index.insert(service_ref.clone(), nodes.len()).is_some() {
                return Err(PlanError::DuplicateService(service_ref));
            }
            nodes.push((service_ref, service));
        }
    }

    let mut edges = Vec::new();
    for (node, (service_ref, service)) in nodes.iter().enumerate() {
        let cx = EvalContext::new(&service_ref.module, &empty, &configs, functions)
            .with_service(&service_ref.service);
        for (position, requirement) in service.requires.iter().enumerate() {
            let target = requirement
                .force_evaluate(&cx, "requires")
                .await
                .and_then(|value| value.into_service_ref())
                .map_err(|source| PlanError::Requires {
                    service: service_ref.clone(),
                    index: position,
                    source,
                })?;
            let dependency =
                *index
                    .get(&target)
                    .ok_or_else(|| PlanError::UnknownDependency {
                        service: service_ref.clone(),
                        target: target.clone(),
                    })?;
            edges.push((dependency, node));
        }
    }

    let order = topological_order(nodes.len(), &edges).map_err(|remaining| PlanError::Cycle {
        services: remaining.into_iter().map(|i| nodes[i].0.clone()).collect(),
    })?;

    let services = order
        .into_iter()
        .map(|i| {
            let (service_ref, spec) = &nodes[i];
            ServiceConfig {
                module_name: service_ref.module.clone(),
                service_name: service_ref.service.clone(),
                image: spec.image.clone(),
                command: spec.command.clone(),
                env: spec.env.clone(),
                wingman: spec.wingman.clone(),
            }
        })
        .collect();

    Ok(Plan { services, configs })
}

/// Evaluate every module's declared config points.
async fn flatten_configs(
    submission: &Submission,
    functions: &dyn FunctionSource,
) -> Result<Vec<ConfigPoint>, PlanError> {
    let empty = State::default();
    let mut points: Vec<ConfigPoint> = Vec::new();

    for module in &submission.modules {
        let cx = EvalContext::new(&module.name, &empty, &[], functions);
        for config in &module.configs {
            if points.iter().any(|p| p.matches(&module.name, &config.identifier)) {
                return Err(PlanError::DuplicateConfig {
                    module: module.name.clone(),
                    identifier: config.identifier.clone(),
                });
            }
            let point = to_config_point(&cx, config)
                .await
                .map_err(|source| PlanError::ConfigPoint {
                    module: module.name.clone(),
                    identifier: config.identifier.clone(),
                    source,
                })?;
            points.push(point);
        }
    }

    Ok(points)
}

async fn to_config_point(
    cx: &EvalContext<'_>,
    config: &ModuleConfig,
) -> Result<ConfigPoint, EvalError> {
    let name = config
        .name
        .force_evaluate(cx, "config point name")
        .await
        .and_then(|v| v.into_string())
        .map_err(|e| e.in_field("name"))?;

    let kind = match &config.kind {
        Some(expr) => {
            let kind = expr
                .force_evaluate(cx, "config point kind")
                .await
                .and_then(|v| v.into_identifier())
                .map_err(|e| e.in_field("kind"))?;
            PointKind::parse(&kind).ok_or(EvalError::InvalidPointKind(kind))?
        }
        None => PointKind::String,
    };

    let description = match &config.description {
        Some(expr) => Some(
            expr.force_evaluate(cx, "config point description")
                .await
                .and_then(|v| v.into_string())
                .map_err(|e| e.in_field("description"))?,
        ),
        None => None,
    };

    Ok(ConfigPoint {
        module_name: cx.module_name().to_string(),
        identifier: config.identifier.clone(),
        name,
        kind,
        description,
    })
}
