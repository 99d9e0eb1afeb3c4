//! Stage abstractions for the pipeline engine.
//!
//! A [`Stage`] receives the previous stage's output and the shared
//! [`PipelineContext`], and returns its own output. The concrete variants:
//!
//! - [`FunctionStage`] wraps a plain closure
//! - [`TransformStage`] wraps a [`Transformer`] for pure value rewrites
//! - [`ProviderStage`] delegates to a registered provider instance
//! - [`ConditionalStage`] runs exactly one of two arms
//! - [`BranchingStage`] fans out over concurrent branches and merges

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use conflux_registry::{ProviderFactory, RegistryError};

use crate::context::{PipelineContext, StageRecord};
use crate::error::{PipelineError, Result};

/// A single unit of work in a pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name, used in records and error messages.
    fn name(&self) -> &str;

    /// Process the previous stage's output, producing this stage's output.
    async fn process(&self, input: Value, ctx: &mut PipelineContext) -> Result<Value>;
}

/// A shareable stage handle.
pub type SharedStage = Arc<dyn Stage>;

/// Closure signature accepted by [`FunctionStage`].
pub type StageFn = Arc<dyn Fn(Value, &mut PipelineContext) -> Result<Value> + Send + Sync>;

/// A stage backed by a plain closure.
pub struct FunctionStage {
    name: String,
    func: StageFn,
}

impl FunctionStage {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(Value, &mut PipelineContext) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn from_fn(name: impl Into<String>, func: StageFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl Stage for FunctionStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, input: Value, ctx: &mut PipelineContext) -> Result<Value> {
        (self.func)(input, ctx)
    }
}

/// A pure value-to-value rewrite, independent of context.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    fn transform(&self, input: Value) -> std::result::Result<Value, String>;
}

/// A stage that applies a [`Transformer`] to its input.
pub struct TransformStage {
    transformer: Arc<dyn Transformer>,
}

impl TransformStage {
    pub fn new(transformer: Arc<dyn Transformer>) -> Self {
        Self { transformer }
    }
}

#[async_trait]
impl Stage for TransformStage {
    fn name(&self) -> &str {
        self.transformer.name()
    }

    async fn process(&self, input: Value, _ctx: &mut PipelineContext) -> Result<Value> {
        self.transformer
            .transform(input)
            .map_err(|message| PipelineError::stage(self.transformer.name(), message))
    }
}

/// A stage that executes a provider resolved through the factory.
///
/// The provider config may contain template placeholders; they are
/// resolved against the context on every invocation before the instance
/// is looked up, so the same stage can target differently-configured
/// instances across runs.
pub struct ProviderStage {
    name: String,
    factory: Arc<ProviderFactory>,
    domain: String,
    provider: String,
    config: Value,
    timeout: Option<Duration>,
}

impl ProviderStage {
    pub fn new(
        factory: Arc<ProviderFactory>,
        domain: impl Into<String>,
        provider: impl Into<String>,
        config: Value,
    ) -> Self {
        let domain = domain.into();
        let provider = provider.into();
        Self {
            name: format!("{domain}/{provider}"),
            factory,
            domain,
            provider,
            config,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Stage for ProviderStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, input: Value, ctx: &mut PipelineContext) -> Result<Value> {
        let config = crate::template::resolve_value(&self.config, ctx)?;
        let provider = self
            .factory
            .resolve(&self.domain, &self.provider, &config)
            .await?;
        debug!(stage = %self.name, "executing provider stage");
        let result = self
            .factory
            .execute_with_timeout(&provider, input, self.timeout)
            .await;
        result.map_err(|err| match err {
            RegistryError::Timeout { timeout_ms, .. } => PipelineError::Timeout { timeout_ms },
            other => PipelineError::Registry(other),
        })
    }
}

/// Predicate signature for [`ConditionalStage`].
pub type Predicate = Arc<dyn Fn(&Value, &PipelineContext) -> bool + Send + Sync>;

/// Runs exactly one of two arms based on a predicate over the input.
///
/// Both arms are required: exactly one child stage executes per call,
/// never both and never neither. Callers that want a no-op else arm pass
/// a passthrough [`FunctionStage`].
pub struct ConditionalStage {
    name: String,
    predicate: Predicate,
    if_true: SharedStage,
    if_false: SharedStage,
}

impl ConditionalStage {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Value, &PipelineContext) -> bool + Send + Sync + 'static,
        if_true: SharedStage,
        if_false: SharedStage,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            if_true,
            if_false,
        }
    }
}

#[async_trait]
impl Stage for ConditionalStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, input: Value, ctx: &mut PipelineContext) -> Result<Value> {
        let (arm, label) = if (self.predicate)(&input, ctx) {
            (&self.if_true, "if_true")
        } else {
            (&self.if_false, "if_false")
        };
        debug!(stage = %self.name, arm = label, "conditional taken");
        arm.process(input, ctx).await
    }
}

/// Fans the input out over named branches running concurrently.
///
/// Every branch receives a clone of the input and an isolated fork of
/// the context. Once all branches settle, successful outputs are merged
/// into an object keyed by branch name and each branch's context writes
/// land back in the parent under `"<branch>.<key>"`.
///
/// By default a failed branch is recorded and skipped while the others'
/// results are kept. With `fail_fast` the first failure (in declared
/// order) aborts the remaining branches and fails the stage.
pub struct BranchingStage {
    name: String,
    branches: Vec<(String, SharedStage)>,
    fail_fast: bool,
}

impl BranchingStage {
    pub fn new(
        name: impl Into<String>,
        branches: Vec<(String, SharedStage)>,
        fail_fast: bool,
    ) -> Self {
        Self {
            name: name.into(),
            branches,
            fail_fast,
        }
    }
}

#[async_trait]
impl Stage for BranchingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, input: Value, ctx: &mut PipelineContext) -> Result<Value> {
        let mut handles = Vec::with_capacity(self.branches.len());
        for (branch_name, stage) in &self.branches {
            let stage = Arc::clone(stage);
            let branch_input = input.clone();
            let mut fork = ctx.fork();
            let branch_name = branch_name.clone();
            handles.push((
                branch_name.clone(),
                tokio::spawn(async move {
                    let output = run_recorded(stage.as_ref(), branch_input, &mut fork).await;
                    (branch_name, output, fork)
                }),
            ));
        }

        let mut merged = Map::new();
        let mut failure: Option<PipelineError> = None;
        // Branches settle in declared order so merges are deterministic
        for (branch_name, handle) in handles {
            if failure.is_some() {
                handle.abort();
                continue;
            }
            match handle.await {
                Ok((name, Ok(output), fork)) => {
                    ctx.merge_branch(&name, fork);
                    merged.insert(name, output);
                }
                Ok((name, Err(err), fork)) => {
                    warn!(stage = %self.name, branch = %name, error = %err, "branch failed");
                    ctx.merge_branch(&name, fork);
                    if self.fail_fast || err.is_fatal() {
                        failure = Some(PipelineError::stage(
                            &self.name,
                            format!("branch '{name}' failed: {err}"),
                        ));
                    } else {
                        merged.insert(name, Value::Object(Map::from_iter([(
                            "error".to_string(),
                            Value::String(err.to_string()),
                        )])));
                    }
                }
                Err(join_err) => {
                    warn!(stage = %self.name, branch = %branch_name, error = %join_err, "branch panicked");
                    failure = Some(PipelineError::stage(
                        &self.name,
                        format!("branch '{branch_name}' panicked: {join_err}"),
                    ));
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(Value::Object(merged)),
        }
    }
}

/// Run one stage and append the outcome to the context history.
pub(crate) async fn run_recorded(
    stage: &dyn Stage,
    input: Value,
    ctx: &mut PipelineContext,
) -> Result<Value> {
    let started_at = conflux_types::now();
    let clock = std::time::Instant::now();
    let result = stage.process(input, ctx).await;
    let duration_ms = clock.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => ctx.record(StageRecord::completed(stage.name(), started_at, duration_ms)),
        Err(err) => ctx.record(StageRecord::failed(
            stage.name(),
            started_at,
            duration_ms,
            err.to_string(),
        )),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Doubler;

    impl Transformer for Doubler {
        fn name(&self) -> &str {
            "double"
        }

        fn transform(&self, input: Value) -> std::result::Result<Value, String> {
            let n = input
                .as_i64()
                .ok_or_else(|| format!("expected integer, got {input}"))?;
            Ok(json!(n * 2))
        }
    }

    fn passthrough(name: &str) -> SharedStage {
        Arc::new(FunctionStage::new(name, |input, _ctx| Ok(input)))
    }

    fn failing(name: &str) -> SharedStage {
        let owned = name.to_string();
        Arc::new(FunctionStage::new(name, move |_input, _ctx| {
            Err(PipelineError::stage(owned.clone(), "boom"))
        }))
    }

    #[tokio::test]
    async fn test_function_stage_sees_context() {
        let stage = FunctionStage::new("tag", |input, ctx: &mut PipelineContext| {
            ctx.set("tagged", json!(true));
            Ok(input)
        });
        let mut ctx = PipelineContext::new();
        stage.process(json!(1), &mut ctx).await.unwrap();
        assert_eq!(ctx.get("tagged"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_transform_stage_maps_errors() {
        let stage = TransformStage::new(Arc::new(Doubler));
        let mut ctx = PipelineContext::new();

        assert_eq!(stage.process(json!(5), &mut ctx).await.unwrap(), json!(10));

        let err = stage.process(json!("nope"), &mut ctx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Stage { ref stage, .. } if stage == "double"));
    }

    #[tokio::test]
    async fn test_conditional_runs_exactly_one_arm() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let make_arm = |label: &str| -> SharedStage {
            let counter = counter.clone();
            let label = label.to_string();
            Arc::new(FunctionStage::new(label.clone(), move |_input, _ctx| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(json!(label.clone()))
            }))
        };

        let stage = ConditionalStage::new(
            "pick",
            |input, _ctx| input.as_i64().is_some_and(|n| n > 0),
            make_arm("positive"),
            make_arm("non-positive"),
        );

        let mut ctx = PipelineContext::new();
        assert_eq!(
            stage.process(json!(3), &mut ctx).await.unwrap(),
            json!("positive")
        );
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);

        assert_eq!(
            stage.process(json!(-3), &mut ctx).await.unwrap(),
            json!("non-positive")
        );
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_conditional_passthrough_else_arm() {
        let stage = ConditionalStage::new(
            "maybe",
            |_input, _ctx| false,
            failing("never"),
            passthrough("noop"),
        );
        let mut ctx = PipelineContext::new();
        assert_eq!(stage.process(json!("x"), &mut ctx).await.unwrap(), json!("x"));
    }

    #[tokio::test]
    async fn test_branching_merges_by_branch_name() {
        let upper: SharedStage = Arc::new(FunctionStage::new("upper", |input, _ctx| {
            let s = input.as_str().unwrap_or_default().to_uppercase();
            Ok(json!(s))
        }));
        let len: SharedStage = Arc::new(FunctionStage::new("len", |input, _ctx| {
            Ok(json!(input.as_str().unwrap_or_default().len()))
        }));

        let stage = BranchingStage::new(
            "analyze",
            vec![("upper".into(), upper), ("len".into(), len)],
            false,
        );
        let mut ctx = PipelineContext::new();
        let out = stage.process(json!("abc"), &mut ctx).await.unwrap();
        assert_eq!(out, json!({"upper": "ABC", "len": 3}));
    }

    #[tokio::test]
    async fn test_branching_fail_soft_keeps_other_results() {
        let stage = BranchingStage::new(
            "mixed",
            vec![("ok".into(), passthrough("ok")), ("bad".into(), failing("bad"))],
            false,
        );
        let mut ctx = PipelineContext::new();
        let out = stage.process(json!("in"), &mut ctx).await.unwrap();
        assert_eq!(out["ok"], json!("in"));
        assert!(out["bad"]["error"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_branching_fail_fast_fails_the_stage() {
        let stage = BranchingStage::new(
            "strict",
            vec![("bad".into(), failing("bad")), ("ok".into(), passthrough("ok"))],
            true,
        );
        let mut ctx = PipelineContext::new();
        let err = stage.process(json!("in"), &mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[tokio::test]
    async fn test_branch_writes_are_namespaced_in_parent() {
        let writer: SharedStage = Arc::new(FunctionStage::new("writer", |input, ctx: &mut PipelineContext| {
            ctx.set("note", json!("written"));
            Ok(input)
        }));
        let stage = BranchingStage::new("fan", vec![("w".into(), writer)], false);
        let mut ctx = PipelineContext::new();
        stage.process(json!(null), &mut ctx).await.unwrap();
        assert_eq!(ctx.get("w.note"), Some(&json!("written")));
        assert!(ctx.get("note").is_none());
    }
}
