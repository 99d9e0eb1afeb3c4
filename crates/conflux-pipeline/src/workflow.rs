//! Declarative workflows: TOML-defined DAGs of provider and function steps.
//!
//! A workflow names its steps and their dependencies; execution order is
//! a deterministic topological sort, so two workflows declaring the same
//! DAG always run their steps in the same order. Step parameters may use
//! `{{...}}` templates to reference the workflow input (`{{input}}`) or
//! any completed step's output by id.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use conflux_registry::ProviderFactory;

use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::stage::{run_recorded, FunctionStage, ProviderStage, SharedStage, StageFn};
use crate::template;

/// Top-level TOML document: `[workflow]` plus `[[workflow.steps]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowFile {
    pub workflow: WorkflowDefinition,
}

/// A named DAG of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<WorkflowStep>,
}

/// One node of the workflow DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique id; other steps reference it in `dependencies` and templates.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub action: StepAction,
    /// Template-resolved and passed to the action as its input object.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Ids of steps that must complete before this one runs.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// What a step executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Execute a provider resolved through the factory.
    Provider {
        domain: String,
        name: String,
        #[serde(default)]
        config: Value,
    },
    /// Execute a function registered on the runner.
    Function { name: String },
}

impl WorkflowDefinition {
    /// Parse and validate a workflow from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: WorkflowFile = toml::from_str(text)
            .map_err(|e| PipelineError::InvalidWorkflow(format!("TOML parse error: {e}")))?;
        file.workflow.validate()?;
        Ok(file.workflow)
    }

    /// Parse and validate a workflow from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::InvalidWorkflow(format!(
                "Cannot read workflow file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml(&text)
    }

    /// Validate structure: non-empty, unique ids, known dependencies,
    /// and an acyclic dependency graph.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::InvalidWorkflow(
                "Workflow name cannot be empty".into(),
            ));
        }
        if self.steps.is_empty() {
            return Err(PipelineError::InvalidWorkflow(format!(
                "Workflow '{}' has no steps",
                self.name
            )));
        }

        let mut ids = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err(PipelineError::InvalidWorkflow(
                    "Step id cannot be empty".into(),
                ));
            }
            if !ids.insert(step.id.as_str()) {
                return Err(PipelineError::InvalidWorkflow(format!(
                    "Duplicate step id '{}'",
                    step.id
                )));
            }
        }
        for step in &self.steps {
            for dep in &step.dependencies {
                if dep == &step.id {
                    return Err(PipelineError::InvalidWorkflow(format!(
                        "Step '{}' depends on itself",
                        step.id
                    )));
                }
                if !ids.contains(dep.as_str()) {
                    return Err(PipelineError::InvalidWorkflow(format!(
                        "Step '{}' depends on unknown step '{dep}'",
                        step.id
                    )));
                }
            }
        }

        self.topo_order().map(|_| ())
    }

    /// Deterministic topological order over step indices.
    ///
    /// Kahn's algorithm with an ordered ready set: among steps whose
    /// dependencies are all satisfied, the one declared earliest runs
    /// first. Identical DAGs therefore always order identically.
    pub fn topo_order(&self) -> Result<Vec<usize>> {
        let index_of: HashMap<&str, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; self.steps.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.steps.len()];
        for (i, step) in self.steps.iter().enumerate() {
            for dep in &step.dependencies {
                // validate() guarantees the dep exists when called first;
                // stay defensive for direct callers.
                let Some(&d) = index_of.get(dep.as_str()) else {
                    return Err(PipelineError::InvalidWorkflow(format!(
                        "Step '{}' depends on unknown step '{dep}'",
                        step.id
                    )));
                };
                in_degree[i] += 1;
                dependents[d].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.steps.len());
        while let Some(&next) = ready.iter().next() {
            ready.remove(&next);
            order.push(next);
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != self.steps.len() {
            let mut stuck: Vec<&str> = self
                .steps
                .iter()
                .enumerate()
                .filter(|(i, _)| !order.contains(i))
                .map(|(_, s)| s.id.as_str())
                .collect();
            stuck.sort();
            return Err(PipelineError::InvalidWorkflow(format!(
                "Workflow '{}' has a dependency cycle involving: {}",
                self.name,
                stuck.join(", ")
            )));
        }
        Ok(order)
    }
}

/// Executes workflow definitions against a provider factory and a table
/// of named functions.
pub struct WorkflowRunner {
    factory: Arc<ProviderFactory>,
    functions: HashMap<String, StageFn>,
}

impl WorkflowRunner {
    pub fn new(factory: Arc<ProviderFactory>) -> Self {
        Self {
            factory,
            functions: HashMap::new(),
        }
    }

    /// Register a function steps can reference by name.
    pub fn with_function(
        mut self,
        name: impl Into<String>,
        func: impl Fn(Value, &mut PipelineContext) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.functions.insert(name.into(), Arc::new(func));
        self
    }

    /// Run a workflow in a fresh context, returning the final step's output.
    pub async fn run(&self, workflow: &WorkflowDefinition, input: Value) -> Result<Value> {
        let mut ctx = PipelineContext::new();
        self.run_with(workflow, input, &mut ctx, &CancellationToken::new(), None)
            .await
    }

    /// Run a workflow in the given context.
    ///
    /// The workflow input is stored under the `input` context key and each
    /// step's output under its id, so later steps can reference both via
    /// templates. Returns the output of the last step in topological order.
    pub async fn run_with(
        &self,
        workflow: &WorkflowDefinition,
        input: Value,
        ctx: &mut PipelineContext,
        cancel: &CancellationToken,
        deadline: Option<Duration>,
    ) -> Result<Value> {
        workflow.validate()?;
        let order = workflow.topo_order()?;
        info!(workflow = %workflow.name, steps = order.len(), "workflow started");

        ctx.set("input", input.clone());
        let run = self.run_steps(workflow, &order, input, ctx, cancel);
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => run.await,
        }
    }

    async fn run_steps(
        &self,
        workflow: &WorkflowDefinition,
        order: &[usize],
        input: Value,
        ctx: &mut PipelineContext,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let mut last = input.clone();
        for &idx in order {
            let step = &workflow.steps[idx];
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let step_input = if step.parameters.is_empty() {
                input.clone()
            } else {
                Value::Object(template::resolve_map(&step.parameters, ctx)?)
            };

            debug!(workflow = %workflow.name, step = %step.id, "step started");
            let stage = self.stage_for(step)?;
            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PipelineError::Cancelled),
                result = run_recorded(stage.as_ref(), step_input, ctx) => result,
            }
            .map_err(|err| {
                if err.is_fatal() {
                    err
                } else {
                    PipelineError::Execution {
                        pipeline: workflow.name.clone(),
                        stage: step.id.clone(),
                        message: err.to_string(),
                    }
                }
            })?;

            ctx.set(step.id.clone(), output.clone());
            last = output;
        }
        Ok(last)
    }

    fn stage_for(&self, step: &WorkflowStep) -> Result<SharedStage> {
        match &step.action {
            StepAction::Provider {
                domain,
                name,
                config,
            } => Ok(Arc::new(ProviderStage::new(
                Arc::clone(&self.factory),
                domain.clone(),
                name.clone(),
                config.clone(),
            ))),
            StepAction::Function { name } => {
                let func = self.functions.get(name).ok_or_else(|| {
                    PipelineError::InvalidWorkflow(format!(
                        "Step '{}' references unknown function '{name}'",
                        step.id
                    ))
                })?;
                Ok(Arc::new(FunctionStage::from_fn(
                    step.id.clone(),
                    Arc::clone(func),
                )))
            }
        }
    }
}
