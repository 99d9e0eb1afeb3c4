//! Pipeline and workflow execution for Conflux.
//!
//! Two execution models share one set of stage primitives:
//!
//! - [`Pipeline`]: an ordered stage list built in code, executed
//!   sequentially with each stage feeding the next.
//! - [`WorkflowDefinition`] + [`WorkflowRunner`]: a TOML-declared DAG of
//!   provider and function steps, executed in deterministic topological
//!   order with `{{...}}` templates wiring step outputs to step inputs.
//!
//! Both run against a [`PipelineContext`] that carries shared key/value
//! state and a per-stage execution history, and both honor cancellation
//! tokens and optional deadlines.

pub mod context;
pub mod error;
pub mod pipeline;
pub mod stage;
pub mod template;
pub mod workflow;

pub use context::{PipelineContext, StageRecord, StageStatus};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use stage::{
    BranchingStage, ConditionalStage, FunctionStage, Predicate, ProviderStage, SharedStage, Stage,
    StageFn, TransformStage, Transformer,
};
pub use template::{resolve_map, resolve_value};
pub use workflow::{StepAction, WorkflowDefinition, WorkflowFile, WorkflowRunner, WorkflowStep};
