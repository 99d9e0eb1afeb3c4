//! Intent-routing orchestrator.
//!
//! The orchestrator is the engine's front door: it takes free-form
//! requests, infers (or accepts) an intent, picks the pipeline routed
//! for that intent, and runs it. Successful results are cached per
//! intent/input pair with a TTL so repeated identical requests skip
//! execution entirely.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use conflux_pipeline::{Pipeline, PipelineContext};
use conflux_types::{ExecutionRequest, ExecutionResult, ResultMetadata};

use crate::cache::ResultCache;
use crate::error::{OrchestratorError, Result};
use crate::intent::{classify_content, Intent, IntentClassifier};

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Inferred intents below this confidence are rejected as ambiguous.
    pub confidence_threshold: f64,
    /// How long cached results stay valid.
    pub cache_ttl: Duration,
    /// Whether results are cached at all.
    pub cache_enabled: bool,
    /// Optional deadline applied to every pipeline run.
    pub run_timeout: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            cache_ttl: Duration::from_secs(300),
            cache_enabled: true,
            run_timeout: None,
        }
    }
}

/// A pipeline registered for one intent.
struct Route {
    intent: String,
    /// Capability tags this route also answers for, beyond its primary
    /// intent.
    tags: Vec<String>,
    pipeline: Arc<Pipeline>,
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    classifier: IntentClassifier,
    routes: Vec<Route>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Route an intent to a pipeline. The first route registered for an
    /// intent wins.
    pub fn route(self, intent: impl Into<String>, pipeline: Arc<Pipeline>) -> Self {
        self.route_with_tags(intent, Vec::new(), pipeline)
    }

    /// Route an intent to a pipeline, also answering for the given
    /// capability tags when no route matches an intent directly.
    pub fn route_with_tags(
        mut self,
        intent: impl Into<String>,
        tags: Vec<String>,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        self.routes.push(Route {
            intent: intent.into(),
            tags,
            pipeline,
        });
        self
    }

    pub fn build(self) -> Orchestrator {
        let cache = ResultCache::new(self.config.cache_ttl);
        Orchestrator {
            config: self.config,
            classifier: self.classifier,
            routes: self.routes,
            cache,
        }
    }
}

/// Routes requests to pipelines by intent, with result caching.
pub struct Orchestrator {
    config: OrchestratorConfig,
    classifier: IntentClassifier,
    routes: Vec<Route>,
    cache: ResultCache,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder {
            config: OrchestratorConfig::default(),
            classifier: IntentClassifier::new(),
            routes: Vec::new(),
        }
    }

    /// Answer a question through the `question` route.
    pub async fn ask(&self, query: &str) -> Result<ExecutionResult> {
        self.dispatch(Intent::explicit("question"), Value::String(query.into()))
            .await
    }

    /// Infer the intent of free-form content and route accordingly.
    ///
    /// When an instruction accompanies the content, inference runs on
    /// the instruction; otherwise on the content itself. This is the
    /// only entry point that can fail with
    /// [`OrchestratorError::AmbiguousIntent`]; the task-specific methods
    /// assert their intent up front, which is an explicit signal rather
    /// than a guess.
    pub async fn process(
        &self,
        content: Value,
        instruction: Option<&str>,
    ) -> Result<ExecutionResult> {
        let text = match instruction {
            Some(i) if !i.trim().is_empty() => i.to_string(),
            _ => match &content {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        };
        let intent = self.classifier.infer(&text);
        if intent.confidence < self.config.confidence_threshold {
            warn!(
                intent = %intent.name,
                confidence = intent.confidence,
                "intent below confidence threshold"
            );
            return Err(OrchestratorError::AmbiguousIntent {
                confidence: intent.confidence,
                threshold: self.config.confidence_threshold,
            });
        }
        self.dispatch(intent, content).await
    }

    /// Produce new content through the `creation` route.
    pub async fn create(
        &self,
        description: &str,
        format: Option<&str>,
    ) -> Result<ExecutionResult> {
        let mut intent = Intent::explicit("creation");
        if let Some(format) = format {
            intent
                .parameters
                .insert("format".into(), Value::String(format.into()));
        }
        self.dispatch(intent, Value::String(description.into()))
            .await
    }

    /// Analyze data through the `analysis` route.
    pub async fn analyze(&self, data: Value, instruction: Option<&str>) -> Result<ExecutionResult> {
        let mut intent = Intent::explicit("analysis");
        if let Some(instruction) = instruction {
            intent
                .parameters
                .insert("instruction".into(), Value::String(instruction.into()));
        }
        self.dispatch(intent, data).await
    }

    /// External boundary: errors never escape, they become `Error`-status
    /// results.
    pub async fn handle(&self, request: ExecutionRequest) -> ExecutionResult {
        let option = |key: &str| -> Option<String> {
            request
                .options
                .as_ref()
                .and_then(|o| o.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let instruction = option("instruction");
        let format = option("format");

        let outcome = match request.task.as_str() {
            "ask" => self.ask(&text_of(&request.input)).await,
            "process" => self.process(request.input, instruction.as_deref()).await,
            "create" => {
                self.create(&text_of(&request.input), format.as_deref())
                    .await
            }
            "analyze" => self.analyze(request.input, instruction.as_deref()).await,
            other => Err(OrchestratorError::UnsupportedTask(other.to_string())),
        };
        match outcome {
            Ok(result) => result,
            Err(err) => ExecutionResult::error(err.to_string()),
        }
    }

    /// Drop expired cache entries, returning how many were removed.
    pub fn purge_cache(&self) -> usize {
        self.cache.purge_expired()
    }

    async fn dispatch(&self, mut intent: Intent, input: Value) -> Result<ExecutionResult> {
        if let Value::String(text) = &input {
            intent
                .parameters
                .entry("content_kind".to_string())
                .or_insert_with(|| Value::String(classify_content(text).as_str().into()));
        }

        // Intent parameters are seeded into the run, so they are part of
        // the cache identity too
        let cache_identity = serde_json::json!({
            "input": input,
            "parameters": intent.parameters,
        });
        let key = ResultCache::key(&intent.name, &cache_identity);
        if self.config.cache_enabled {
            if let Some(cached) = self.cache.get(&key) {
                info!(intent = %intent.name, "serving cached result");
                return Ok(ExecutionResult::success(
                    cached,
                    ResultMetadata {
                        execution_time_ms: 0,
                        stages_run: 0,
                        cache_hit: true,
                    },
                ));
            }
        }

        // Exact intent match first; capability tags are the fallback
        let route = self
            .routes
            .iter()
            .find(|r| r.intent == intent.name)
            .or_else(|| {
                self.routes
                    .iter()
                    .find(|r| r.tags.iter().any(|t| t == &intent.name))
            })
            .ok_or_else(|| OrchestratorError::NoRoute(intent.name.clone()))?;
        debug!(intent = %intent.name, pipeline = %route.pipeline.name(), "dispatching");

        let mut ctx = PipelineContext::new();
        ctx.set("intent", Value::String(intent.name.clone()));
        if !intent.parameters.is_empty() {
            ctx.set("intent_parameters", Value::Object(intent.parameters.clone()));
        }

        let clock = Instant::now();
        let output = route
            .pipeline
            .execute_with(
                input,
                &mut ctx,
                &CancellationToken::new(),
                self.config.run_timeout,
            )
            .await?;
        let metadata = ResultMetadata {
            execution_time_ms: clock.elapsed().as_millis() as u64,
            stages_run: ctx.stages_run(),
            cache_hit: false,
        };

        if self.config.cache_enabled {
            self.cache.put(key, output.clone());
        }
        Ok(ExecutionResult::success(output, metadata))
    }
}

fn text_of(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_pipeline(name: &str) -> Arc<Pipeline> {
        Arc::new(
            Pipeline::builder(name)
                .function("echo", |input, _ctx| Ok(input))
                .build(),
        )
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::builder()
            .route("question", echo_pipeline("qa"))
            .route("analysis", echo_pipeline("analysis"))
            .build()
    }

    #[tokio::test]
    async fn test_ask_routes_to_question_pipeline() {
        let result = orchestrator().ask("what is conflux?").await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.result, Some(json!("what is conflux?")));
        assert_eq!(result.metadata.stages_run, 1);
        assert!(!result.metadata.cache_hit);
    }

    #[tokio::test]
    async fn test_capability_tag_answers_unrouted_intent() {
        let orch = Orchestrator::builder()
            .route_with_tags(
                "analysis",
                vec!["summarize".into(), "transform".into()],
                echo_pipeline("analysis"),
            )
            .build();
        let result = orch
            .process(json!("summarize the release notes"), None)
            .await
            .unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_missing_route_is_an_error() {
        let err = orchestrator().create("a poem", None).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NoRoute(ref name) if name == "creation"));
    }

    #[tokio::test]
    async fn test_ambiguous_input_is_rejected() {
        let err = orchestrator()
            .process(json!("lorem ipsum dolor"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::AmbiguousIntent { .. }));
    }

    #[tokio::test]
    async fn test_instruction_drives_inference_for_non_text_content() {
        let result = orchestrator()
            .process(json!({"rows": [1, 2, 3]}), Some("analyze these rows"))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.result, Some(json!({"rows": [1, 2, 3]})));
    }

    #[tokio::test]
    async fn test_second_identical_request_hits_cache() {
        let orch = orchestrator();
        let first = orch.ask("what is conflux?").await.unwrap();
        assert!(!first.metadata.cache_hit);

        let second = orch.ask("what is conflux?").await.unwrap();
        assert!(second.metadata.cache_hit);
        assert_eq!(second.result, first.result);
        assert_eq!(second.metadata.stages_run, 0);
    }

    #[tokio::test]
    async fn test_cache_can_be_disabled() {
        let orch = Orchestrator::builder()
            .config(OrchestratorConfig {
                cache_enabled: false,
                ..OrchestratorConfig::default()
            })
            .route("question", echo_pipeline("qa"))
            .build();
        orch.ask("what?").await.unwrap();
        let second = orch.ask("what?").await.unwrap();
        assert!(!second.metadata.cache_hit);
    }

    #[tokio::test]
    async fn test_handle_converts_errors_to_results() {
        let result = orchestrator()
            .handle(ExecutionRequest::new("frobnicate", json!(null)))
            .await;
        assert!(!result.is_success());
        assert_eq!(result.error.as_deref(), Some("Unsupported task: frobnicate"));
    }

    #[tokio::test]
    async fn test_handle_dispatches_known_tasks() {
        let result = orchestrator()
            .handle(ExecutionRequest::new("analyze", json!("some content")))
            .await;
        assert!(result.is_success());
        assert_eq!(result.result, Some(json!("some content")));
    }
}
