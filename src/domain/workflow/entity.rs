//! Workflow specification: stages, tasks, and schema validation
//!
//! A `WorkflowSpec` is immutable once produced. Planning-model output is
//! deserialized and fully validated here before the scheduler ever sees it;
//! the scheduler is never invoked with an invalid spec.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::context::placeholder_names;
use super::error::WorkflowError;
use crate::domain::model::ModelId;

/// How the tasks of a stage are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Tasks run one at a time, each seeing its predecessors' outputs
    Sequential,
    /// Tasks run concurrently against the stage-entry context
    Parallel,
}

/// Per-task generation overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addons: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Non-critical task: its terminal failure does not fail the run
    pub optional: bool,
}

/// One model invocation unit inside a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub model: ModelId,

    /// Prompt template; `{name}` placeholders resolve against the run context
    pub prompt: String,

    /// Context variable this task's result is stored under
    pub output_variable: String,

    #[serde(default)]
    pub config: TaskConfig,
}

/// A scheduling unit: the barrier boundary of the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub kind: StageKind,
    pub tasks: Vec<TaskSpec>,
}

/// An ordered sequence of stages, executed strictly in order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub stages: Vec<Stage>,
}

impl WorkflowSpec {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// A one-task degradation plan: one sequential stage running `prompt`
    pub fn single_task(model: ModelId, prompt: impl Into<String>) -> Self {
        Self {
            stages: vec![Stage {
                kind: StageKind::Sequential,
                tasks: vec![TaskSpec {
                    model,
                    prompt: prompt.into(),
                    output_variable: "completion_message".to_string(),
                    config: TaskConfig::default(),
                }],
            }],
        }
    }

    pub fn task_count(&self) -> usize {
        self.stages.iter().map(|s| s.tasks.len()).sum()
    }

    /// Validate the structural invariants of the spec
    ///
    /// Checks, in order: at least one stage; no empty stage; non-empty output
    /// variables; no duplicate `output_variable` within a stage (two writers
    /// racing for one name); and no parallel task referencing a sibling's
    /// output, which could never be satisfied because parallel prompts are
    /// substituted at stage entry.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.stages.is_empty() {
            return Err(WorkflowError::schema_validation("workflow has no stages"));
        }

        for (stage_index, stage) in self.stages.iter().enumerate() {
            if stage.tasks.is_empty() {
                return Err(WorkflowError::schema_validation(format!(
                    "stage {stage_index} has no tasks"
                )));
            }

            let mut outputs: HashSet<&str> = HashSet::new();

            for task in &stage.tasks {
                if task.output_variable.trim().is_empty() {
                    return Err(WorkflowError::schema_validation(format!(
                        "stage {stage_index}: task for model '{}' has an empty output_variable",
                        task.model
                    )));
                }

                if !outputs.insert(task.output_variable.as_str()) {
                    return Err(WorkflowError::schema_validation(format!(
                        "stage {stage_index}: duplicate output_variable '{}'",
                        task.output_variable
                    )));
                }
            }

            if stage.kind == StageKind::Parallel {
                for task in &stage.tasks {
                    for name in placeholder_names(&task.prompt) {
                        if outputs.contains(name.as_str())
                            && name != task.output_variable
                        {
                            return Err(WorkflowError::schema_validation(format!(
                                "stage {stage_index}: parallel task '{}' references \
                                 sibling output '{name}'",
                                task.output_variable
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str) -> ModelId {
        ModelId::new(id).unwrap()
    }

    fn task(model_id: &str, prompt: &str, output: &str) -> TaskSpec {
        TaskSpec {
            model: model(model_id),
            prompt: prompt.to_string(),
            output_variable: output.to_string(),
            config: TaskConfig::default(),
        }
    }

    #[test]
    fn test_deserialize_spec() {
        let json = r#"{
            "stages": [
                {
                    "kind": "sequential",
                    "tasks": [
                        {
                            "model": "thinking",
                            "prompt": "List 5 benefits of {topic}",
                            "output_variable": "benefits",
                            "config": {"temperature": 0.7, "max_tokens": 1000}
                        }
                    ]
                },
                {
                    "kind": "parallel",
                    "tasks": [
                        {"model": "thinking", "prompt": "Summarize: {benefits}", "output_variable": "summary"},
                        {"model": "medium", "prompt": "Critique: {benefits}", "output_variable": "critique"}
                    ]
                }
            ]
        }"#;

        let spec: WorkflowSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.stages.len(), 2);
        assert_eq!(spec.stages[1].kind, StageKind::Parallel);
        assert_eq!(spec.task_count(), 3);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_unknown_stage_kind_rejected() {
        let json = r#"{"stages": [{"kind": "linear", "tasks": []}]}"#;
        assert!(serde_json::from_str::<WorkflowSpec>(json).is_err());
    }

    #[test]
    fn test_missing_output_variable_rejected() {
        let json = r#"{
            "stages": [{
                "kind": "sequential",
                "tasks": [{"model": "thinking", "prompt": "hi"}]
            }]
        }"#;
        assert!(serde_json::from_str::<WorkflowSpec>(json).is_err());
    }

    #[test]
    fn test_validate_empty_workflow() {
        let spec = WorkflowSpec::new(vec![]);
        assert!(matches!(
            spec.validate(),
            Err(WorkflowError::SchemaValidation(_))
        ));
    }

    #[test]
    fn test_validate_empty_stage() {
        let spec = WorkflowSpec::new(vec![Stage {
            kind: StageKind::Sequential,
            tasks: vec![],
        }]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_output_in_stage() {
        let spec = WorkflowSpec::new(vec![Stage {
            kind: StageKind::Parallel,
            tasks: vec![
                task("thinking", "a", "result"),
                task("medium", "b", "result"),
            ],
        }]);

        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate output_variable"));
    }

    #[test]
    fn test_validate_parallel_sibling_reference() {
        let spec = WorkflowSpec::new(vec![Stage {
            kind: StageKind::Parallel,
            tasks: vec![
                task("thinking", "write an outline of {topic}", "outline"),
                task("medium", "expand {outline}", "article"),
            ],
        }]);

        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("sibling output"));
    }

    #[test]
    fn test_sequential_sibling_reference_allowed() {
        let spec = WorkflowSpec::new(vec![Stage {
            kind: StageKind::Sequential,
            tasks: vec![
                task("thinking", "write an outline of {topic}", "outline"),
                task("medium", "expand {outline}", "article"),
            ],
        }]);

        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_single_task_plan() {
        let spec = WorkflowSpec::single_task(model("thinking"), "original request");
        assert!(spec.validate().is_ok());
        assert_eq!(spec.task_count(), 1);
        assert_eq!(
            spec.stages[0].tasks[0].output_variable,
            "completion_message"
        );
    }
}
