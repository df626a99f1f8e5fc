use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expression::Bindings;

/// A math problem: its statement, canonical solution and ordered hint steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Text describing the task.
    pub question: String,
    /// Canonical answer, compared after trimming surrounding whitespace.
    pub solution: String,
    /// Ordered hints, the first one is the primary hint.
    pub steps: Vec<String>,
    /// Named values attached to the problem.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
}

impl Problem {
    pub fn new(
        question: impl Into<String>,
        solution: impl Into<String>,
        steps: Vec<String>,
    ) -> Self {
        Self {
            question: question.into(),
            solution: solution.into(),
            steps,
            variables: HashMap::new(),
        }
    }

    pub fn with_variables(mut self, variables: HashMap<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    /// The first hint step, if any.
    pub fn primary_hint(&self) -> Option<&str> {
        self.steps.first().map(String::as_str)
    }

    /// Whether `candidate` matches the solution, ignoring surrounding whitespace.
    pub fn is_solved_by(&self, candidate: &str) -> bool {
        self.solution.trim() == candidate.trim()
    }

    /// Variables holding a JSON number, usable as expression bindings.
    pub fn numeric_variables(&self) -> Bindings {
        self.variables
            .iter()
            .filter_map(|(name, value)| value.as_f64().map(|v| (name.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn solution_match_is_exact_after_trim() {
        let problem = Problem::new("1 + 1?", " 2 ", vec![]);

        assert!(problem.is_solved_by("2"));
        assert!(problem.is_solved_by("\t2\n"));
        assert!(!problem.is_solved_by("2.0"));
        assert!(!problem.is_solved_by("two"));
    }

    #[test]
    fn solution_match_is_case_sensitive() {
        let problem = Problem::new("Name the constant", "Pi", vec![]);

        assert!(!problem.is_solved_by("pi"));
    }

    #[test]
    fn numeric_variables_skip_non_numbers() {
        let problem = Problem::new("Evaluate x + y", "5", vec![]).with_variables(HashMap::from([
            ("x".to_string(), json!(2)),
            ("y".to_string(), json!(3.0)),
            ("label".to_string(), json!("sum")),
        ]));

        let bindings = problem.numeric_variables();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings["x"], 2.0);
        assert_eq!(bindings["y"], 3.0);
    }

    #[test]
    fn deserialize_without_variables() {
        let problem: Problem = serde_json::from_value(json!({
            "question": "2 * 3?",
            "solution": "6",
            "steps": ["Multiply 2 by 3"]
        }))
        .unwrap();

        assert!(problem.variables.is_empty());
        assert_eq!(problem.primary_hint(), Some("Multiply 2 by 3"));
    }
}
