//! Shared mutable state threaded through one pipeline execution.

use std::collections::HashMap;

use serde_json::Value;

use conflux_types::{new_id, Id, Timestamp};

/// Outcome of a single stage, recorded in the context history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Completed,
    Failed,
}

/// Per-stage execution record.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage: String,
    pub status: StageStatus,
    pub started_at: Timestamp,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl StageRecord {
    /// Record a completed stage.
    pub fn completed(stage: impl Into<String>, started_at: Timestamp, duration_ms: u64) -> Self {
        Self {
            stage: stage.into(),
            status: StageStatus::Completed,
            started_at,
            duration_ms,
            error: None,
        }
    }

    /// Record a failed stage.
    pub fn failed(
        stage: impl Into<String>,
        started_at: Timestamp,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            status: StageStatus::Failed,
            started_at,
            duration_ms,
            error: Some(error.into()),
        }
    }
}

/// Mutable key/value state for a single pipeline run.
///
/// One context exists per execution. Stages read and write values through
/// `get`/`set`; the engine appends a [`StageRecord`] per stage. When a
/// [`crate::stage::BranchingStage`] fans out, each branch works against a
/// [`PipelineContext::fork`] of the parent and the parent merges the
/// branches' writes back under `"<branch>.<key>"` namespaced keys, so
/// sibling branches can never observe each other's writes mid-flight.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    session_id: Id,
    values: HashMap<String, Value>,
    history: Vec<StageRecord>,
    /// Snapshot taken at fork time, used to compute this branch's writes.
    base: Option<HashMap<String, Value>>,
}

impl PipelineContext {
    /// Create an empty context with a fresh session id.
    pub fn new() -> Self {
        Self {
            session_id: new_id(),
            values: HashMap::new(),
            history: Vec::new(),
            base: None,
        }
    }

    /// Create a context tied to an existing session.
    pub fn with_session(session_id: Id) -> Self {
        Self {
            session_id,
            ..Self::new()
        }
    }

    pub fn session_id(&self) -> Id {
        self.session_id
    }

    /// Set a value. Overwrites any previous value under the key.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Remove a value, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// All keys, sorted for stable output.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// The raw value map (read-only), for template resolution.
    pub fn data(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// Append a stage record.
    pub fn record(&mut self, record: StageRecord) {
        self.history.push(record);
    }

    /// The per-stage execution history, in execution order.
    pub fn history(&self) -> &[StageRecord] {
        &self.history
    }

    /// Number of stages recorded so far.
    pub fn stages_run(&self) -> usize {
        self.history.len()
    }

    /// Create an isolated view for one branch of a fan-out.
    ///
    /// The fork sees every value present at fork time but has its own
    /// value map and empty history; writes stay invisible to siblings
    /// until the parent merges them back.
    pub fn fork(&self) -> Self {
        Self {
            session_id: self.session_id,
            values: self.values.clone(),
            history: Vec::new(),
            base: Some(self.values.clone()),
        }
    }

    /// Entries added or changed since this context was forked, sorted by
    /// key. For an unforked context this is every entry.
    pub fn writes(&self) -> Vec<(String, Value)> {
        let mut writes: Vec<(String, Value)> = self
            .values
            .iter()
            .filter(|(k, v)| match &self.base {
                Some(base) => base.get(*k) != Some(*v),
                None => true,
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        writes.sort_by(|a, b| a.0.cmp(&b.0));
        writes
    }

    /// Merge a settled branch back into this context.
    ///
    /// The branch's writes land under `"<branch>.<key>"` and its stage
    /// records are appended to this context's history.
    pub fn merge_branch(&mut self, branch: &str, branch_ctx: PipelineContext) {
        for (key, value) in branch_ctx.writes() {
            self.values.insert(format!("{branch}.{key}"), value);
        }
        self.history.extend(branch_ctx.history);
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_types::now;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let mut ctx = PipelineContext::new();
        ctx.set("a", json!(1));
        assert_eq!(ctx.get("a"), Some(&json!(1)));
        assert_eq!(ctx.remove("a"), Some(json!(1)));
        assert!(ctx.get("a").is_none());
    }

    #[test]
    fn test_keys_sorted() {
        let mut ctx = PipelineContext::new();
        ctx.set("b", json!(2));
        ctx.set("a", json!(1));
        assert_eq!(ctx.keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_fork_sees_parent_values() {
        let mut ctx = PipelineContext::new();
        ctx.set("shared", json!("base"));
        let fork = ctx.fork();
        assert_eq!(fork.get("shared"), Some(&json!("base")));
        assert_eq!(fork.session_id(), ctx.session_id());
    }

    #[test]
    fn test_fork_writes_are_isolated() {
        let mut ctx = PipelineContext::new();
        ctx.set("shared", json!("base"));

        let mut left = ctx.fork();
        let mut right = ctx.fork();
        left.set("result", json!("from-left"));
        right.set("result", json!("from-right"));

        // Neither branch sees the other's write
        assert_eq!(left.get("result"), Some(&json!("from-left")));
        assert_eq!(right.get("result"), Some(&json!("from-right")));
        assert!(ctx.get("result").is_none());
    }

    #[test]
    fn test_writes_only_reports_changes() {
        let mut ctx = PipelineContext::new();
        ctx.set("unchanged", json!(1));
        ctx.set("modified", json!("old"));

        let mut fork = ctx.fork();
        fork.set("modified", json!("new"));
        fork.set("added", json!(true));

        let writes = fork.writes();
        assert_eq!(
            writes,
            vec![
                ("added".to_string(), json!(true)),
                ("modified".to_string(), json!("new")),
            ]
        );
    }

    #[test]
    fn test_merge_branch_namespaces_keys() {
        let mut ctx = PipelineContext::new();
        ctx.set("shared", json!("base"));

        let mut left = ctx.fork();
        left.set("result", json!("L"));
        let mut right = ctx.fork();
        right.set("result", json!("R"));

        ctx.merge_branch("left", left);
        ctx.merge_branch("right", right);

        assert_eq!(ctx.get("left.result"), Some(&json!("L")));
        assert_eq!(ctx.get("right.result"), Some(&json!("R")));
        // The un-namespaced key is untouched
        assert_eq!(ctx.get("shared"), Some(&json!("base")));
    }

    #[test]
    fn test_merge_branch_carries_history() {
        let mut ctx = PipelineContext::new();
        let mut fork = ctx.fork();
        fork.record(StageRecord::completed("inner", now(), 3));
        ctx.merge_branch("b", fork);
        assert_eq!(ctx.stages_run(), 1);
        assert_eq!(ctx.history()[0].stage, "inner");
    }
}
