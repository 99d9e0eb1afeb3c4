//! Sequential pipeline execution.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::stage::{
    run_recorded, BranchingStage, FunctionStage, SharedStage, Stage, TransformStage, Transformer,
};

/// An ordered sequence of stages executed against one context.
///
/// Each stage receives the previous stage's output. On failure the run
/// stops with [`PipelineError::Execution`] unless `continue_on_error` is
/// set, in which case the failing stage is recorded and the previous
/// output is carried to the next stage. Timeouts and cancellation always
/// stop the run.
pub struct Pipeline {
    name: String,
    stages: Vec<SharedStage>,
    continue_on_error: bool,
}

impl Pipeline {
    /// Start building a pipeline.
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder {
            name: name.into(),
            stages: Vec::new(),
            continue_on_error: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run the pipeline in a fresh context, without a deadline.
    pub async fn execute(&self, input: Value) -> Result<Value> {
        let mut ctx = PipelineContext::new();
        self.execute_with(input, &mut ctx, &CancellationToken::new(), None)
            .await
    }

    /// Run the pipeline in the given context, with cancellation and an
    /// optional deadline covering the whole run.
    pub async fn execute_with(
        &self,
        input: Value,
        ctx: &mut PipelineContext,
        cancel: &CancellationToken,
        deadline: Option<Duration>,
    ) -> Result<Value> {
        info!(pipeline = %self.name, stages = self.stages.len(), "pipeline started");
        let run = self.run_stages(input, ctx, cancel);
        let result = match deadline {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => run.await,
        };
        match &result {
            Ok(_) => info!(pipeline = %self.name, "pipeline completed"),
            Err(err) => warn!(pipeline = %self.name, error = %err, "pipeline failed"),
        }
        result
    }

    async fn run_stages(
        &self,
        input: Value,
        ctx: &mut PipelineContext,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let mut current = input;
        for stage in &self.stages {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            debug!(pipeline = %self.name, stage = %stage.name(), "stage started");
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PipelineError::Cancelled),
                result = run_recorded(stage.as_ref(), current.clone(), ctx) => result,
            };
            match attempt {
                Ok(output) => current = output,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) if self.continue_on_error => {
                    warn!(pipeline = %self.name, stage = %stage.name(), error = %err,
                        "stage failed, continuing");
                }
                Err(err) => {
                    return Err(PipelineError::Execution {
                        pipeline: self.name.clone(),
                        stage: stage.name().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(current)
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    name: String,
    stages: Vec<SharedStage>,
    continue_on_error: bool,
}

impl PipelineBuilder {
    /// Append a stage.
    pub fn stage(mut self, stage: SharedStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append a closure-backed stage.
    pub fn function(
        self,
        name: impl Into<String>,
        func: impl Fn(Value, &mut PipelineContext) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.stage(Arc::new(FunctionStage::new(name, func)))
    }

    /// Append a transformer-backed stage.
    pub fn transform(self, transformer: Arc<dyn Transformer>) -> Self {
        self.stage(Arc::new(TransformStage::new(transformer)))
    }

    /// Append a fail-soft branching stage.
    pub fn branching(
        self,
        name: impl Into<String>,
        branches: Vec<(String, SharedStage)>,
    ) -> Self {
        self.stage(Arc::new(BranchingStage::new(name, branches, false)))
    }

    /// Record stage failures and keep running instead of stopping.
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            name: self.name,
            stages: self.stages,
            continue_on_error: self.continue_on_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StageStatus;
    use serde_json::json;

    fn numeric_pipeline(continue_on_error: bool) -> Pipeline {
        Pipeline::builder("numeric")
            .function("double", |input, _ctx| {
                let n = input
                    .as_i64()
                    .ok_or_else(|| PipelineError::stage("double", "not an integer"))?;
                Ok(json!(n * 2))
            })
            .function("increment", |input, _ctx| {
                let n = input
                    .as_i64()
                    .ok_or_else(|| PipelineError::stage("increment", "not an integer"))?;
                Ok(json!(n + 1))
            })
            .function("stringify", |input, _ctx| Ok(json!(input.to_string())))
            .continue_on_error(continue_on_error)
            .build()
    }

    #[tokio::test]
    async fn test_stages_chain_outputs() {
        let out = numeric_pipeline(false).execute(json!(5)).await.unwrap();
        assert_eq!(out, json!("11"));
    }

    #[tokio::test]
    async fn test_failure_stops_run_by_default() {
        let pipeline = numeric_pipeline(false);
        let err = pipeline.execute(json!("not a number")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Execution { ref stage, .. } if stage == "double"
        ));
    }

    #[tokio::test]
    async fn test_continue_on_error_carries_previous_output() {
        let pipeline = Pipeline::builder("soft")
            .function("fails", |_input, _ctx| {
                Err(PipelineError::stage("fails", "boom"))
            })
            .function("passes", |input, _ctx| Ok(input))
            .continue_on_error(true)
            .build();

        let mut ctx = PipelineContext::new();
        let out = pipeline
            .execute_with(json!("seed"), &mut ctx, &CancellationToken::new(), None)
            .await
            .unwrap();
        // The failed stage's input is carried forward
        assert_eq!(out, json!("seed"));
        assert_eq!(ctx.history()[0].status, StageStatus::Failed);
        assert_eq!(ctx.history()[1].status, StageStatus::Completed);
    }

    #[tokio::test]
    async fn test_history_records_every_stage() {
        let pipeline = numeric_pipeline(false);
        let mut ctx = PipelineContext::new();
        pipeline
            .execute_with(json!(5), &mut ctx, &CancellationToken::new(), None)
            .await
            .unwrap();
        let names: Vec<&str> = ctx.history().iter().map(|r| r.stage.as_str()).collect();
        assert_eq!(names, vec!["double", "increment", "stringify"]);
        assert!(ctx
            .history()
            .iter()
            .all(|r| r.status == StageStatus::Completed));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_stops_immediately() {
        let pipeline = numeric_pipeline(false);
        let token = CancellationToken::new();
        token.cancel();
        let mut ctx = PipelineContext::new();
        let err = pipeline
            .execute_with(json!(5), &mut ctx, &token, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(ctx.stages_run(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_slow_stage() {
        let pipeline = Pipeline::builder("slow")
            .function("fast", |input, _ctx| Ok(input))
            .stage(Arc::new(crate::stage::FunctionStage::new(
                "never-used",
                |input, _ctx| Ok(input),
            )))
            .build();

        // Cancel fires between the poll of the biased arm and the stage:
        // a token cancelled before a stage begins wins the select.
        let token = CancellationToken::new();
        token.cancel();
        let err = pipeline
            .execute_with(json!(1), &mut PipelineContext::new(), &token, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let pipeline = Pipeline::builder("stuck")
            .stage(Arc::new(SleepStage))
            .build();
        let err = pipeline
            .execute_with(
                json!(null),
                &mut PipelineContext::new(),
                &CancellationToken::new(),
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { timeout_ms: 50 }));
    }

    struct SleepStage;

    #[async_trait::async_trait]
    impl Stage for SleepStage {
        fn name(&self) -> &str {
            "sleep"
        }

        async fn process(
            &self,
            input: Value,
            _ctx: &mut PipelineContext,
        ) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(input)
        }
    }

    #[tokio::test]
    async fn test_empty_pipeline_returns_input() {
        let pipeline = Pipeline::builder("empty").build();
        assert_eq!(pipeline.execute(json!(7)).await.unwrap(), json!(7));
    }
}
