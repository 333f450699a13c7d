//! Execution context and prompt template substitution
//!
//! The context is the variable store for exactly one workflow run. Prompt
//! templates reference variables as `{name}`; every placeholder is replaced
//! in a single left-to-right pass with the exact stored string. There is no
//! recursive re-substitution: braces inside a substituted value are left
//! alone. An unresolved placeholder is always a hard error.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::WorkflowError;

/// Placeholder pattern: `{variable_name}`
static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").unwrap());

/// Variable names referenced by a template, in order of appearance
pub fn placeholder_names(template: &str) -> Vec<String> {
    PLACEHOLDER_PATTERN
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Mutable variable store scoped to one workflow run
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    values: HashMap<String, String>,
    /// Variables whose producing task failed (non-critical tasks), keyed to
    /// the task that should have produced them
    failed: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the context with initial variables (e.g. `user_message`)
    pub fn with_variables(variables: HashMap<String, String>) -> Self {
        Self {
            values: variables,
            failed: HashMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.failed.remove(&name);
        self.values.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Record that the task producing `name` failed, so later references
    /// fail with an upstream error instead of a missing-variable error.
    pub fn mark_failed(&mut self, name: impl Into<String>, task: impl Into<String>) {
        self.failed.insert(name.into(), task.into());
    }

    pub fn variables(&self) -> &HashMap<String, String> {
        &self.values
    }

    pub fn into_variables(self) -> HashMap<String, String> {
        self.values
    }

    /// Render a prompt template against the current variables
    pub fn render(&self, template: &str) -> Result<String, WorkflowError> {
        let mut rendered = String::with_capacity(template.len());
        let mut last_end = 0;

        for caps in PLACEHOLDER_PATTERN.captures_iter(template) {
            let whole = caps.get(0).expect("capture 0 always present");
            let name = &caps[1];

            rendered.push_str(&template[last_end..whole.start()]);

            match self.values.get(name) {
                Some(value) => rendered.push_str(value),
                None => {
                    if let Some(task) = self.failed.get(name) {
                        return Err(WorkflowError::upstream_failed(name, task.clone()));
                    }
                    return Err(WorkflowError::missing_variable(name));
                }
            }

            last_end = whole.end();
        }

        rendered.push_str(&template[last_end..]);
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_variable() {
        let mut ctx = ExecutionContext::new();
        ctx.set("topic", "cloud computing");

        let rendered = ctx.render("List 5 benefits of {topic}").unwrap();
        assert_eq!(rendered, "List 5 benefits of cloud computing");
    }

    #[test]
    fn test_render_multiple_occurrences() {
        let mut ctx = ExecutionContext::new();
        ctx.set("name", "Ada");

        let rendered = ctx.render("{name}, meet {name}").unwrap();
        assert_eq!(rendered, "Ada, meet Ada");
    }

    #[test]
    fn test_render_missing_variable_is_hard_error() {
        let ctx = ExecutionContext::new();
        let err = ctx.render("Summarize: {benefits}").unwrap_err();
        assert_eq!(err, WorkflowError::missing_variable("benefits"));
    }

    #[test]
    fn test_render_upstream_failed() {
        let mut ctx = ExecutionContext::new();
        ctx.mark_failed("summary", "summarize");

        let err = ctx.render("Review {summary}").unwrap_err();
        assert_eq!(err, WorkflowError::upstream_failed("summary", "summarize"));
    }

    #[test]
    fn test_no_recursive_substitution() {
        let mut ctx = ExecutionContext::new();
        ctx.set("outer", "{inner}");
        ctx.set("inner", "should not appear");

        let rendered = ctx.render("value: {outer}").unwrap();
        assert_eq!(rendered, "value: {inner}");
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut ctx = ExecutionContext::new();
        ctx.set("a", "1");

        let first = ctx.render("{a} and {a}").unwrap();
        let second = ctx.render("{a} and {a}").unwrap();
        assert_eq!(first, second);

        let err1 = ctx.render("{missing}").unwrap_err();
        let err2 = ctx.render("{missing}").unwrap_err();
        assert_eq!(err1, err2);
    }

    #[test]
    fn test_literal_text_untouched() {
        let ctx = ExecutionContext::new();
        let rendered = ctx.render("no placeholders here").unwrap();
        assert_eq!(rendered, "no placeholders here");
    }

    #[test]
    fn test_set_clears_failed_mark() {
        let mut ctx = ExecutionContext::new();
        ctx.mark_failed("v", "task1");
        ctx.set("v", "recovered");

        assert_eq!(ctx.render("{v}").unwrap(), "recovered");
    }

    #[test]
    fn test_placeholder_names() {
        let names = placeholder_names("use {a}, then {b}, then {a}");
        assert_eq!(names, vec!["a", "b", "a"]);
    }
}
