use std::collections::HashMap;

use serde_json::Value;

use crate::{
    expression::{self, Bindings},
    problem::Problem,
};

/// Returned by [`ProblemEnvironment::get_hint`] when no problem is set.
pub const NO_PROBLEM_MESSAGE: &str = "No problem is currently set.";
/// Returned by [`ProblemEnvironment::get_hint`] when the problem has no steps.
pub const NO_HINTS_MESSAGE: &str = "No hints available.";

/// Environment for mathematical reasoning over a single active problem.
///
/// Every problem ever set is kept in an append-only history; the current problem
/// is always the most recent entry.
#[derive(Debug, Default)]
pub struct ProblemEnvironment {
    history: Vec<Problem>,
    /// Index of the current problem in `history`.
    current: Option<usize>,
}

impl ProblemEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a problem without making it current.
    pub fn create_problem(
        question: impl Into<String>,
        solution: impl Into<String>,
        steps: Vec<String>,
        variables: Option<HashMap<String, Value>>,
    ) -> Problem {
        Problem::new(question, solution, steps).with_variables(variables.unwrap_or_default())
    }

    /// Make `problem` the current problem and record it in the history.
    pub fn set_problem(&mut self, problem: Problem) {
        self.history.push(problem);
        self.current = Some(self.history.len() - 1);
    }

    pub fn current_problem(&self) -> Option<&Problem> {
        self.current.and_then(|index| self.history.get(index))
    }

    /// All problems set so far, oldest first.
    pub fn history(&self) -> &[Problem] {
        &self.history
    }

    /// Check a proposed answer against the current problem.
    ///
    /// Always `false` when no problem is set.
    pub fn verify_solution(&self, candidate: &str) -> bool {
        self.current_problem()
            .is_some_and(|problem| problem.is_solved_by(candidate))
    }

    /// Evaluate a math expression, `None` if it cannot be parsed or has no finite value.
    pub fn evaluate_expression(&self, expr: &str) -> Option<f64> {
        Self::evaluate(expr, &Bindings::new())
    }

    /// Like [`evaluate_expression`](Self::evaluate_expression), with the numeric
    /// variables of the current problem bound as symbols.
    pub fn evaluate_in_context(&self, expr: &str) -> Option<f64> {
        let bindings = self
            .current_problem()
            .map(Problem::numeric_variables)
            .unwrap_or_default();
        Self::evaluate(expr, &bindings)
    }

    fn evaluate(expr: &str, bindings: &Bindings) -> Option<f64> {
        match expression::evaluate_with(expr, bindings) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!("Could not evaluate {expr:?}: {err}");
                None
            }
        }
    }

    /// Set `problem` as current and return its solution steps.
    pub fn step_by_step_solve(&mut self, problem: Problem) -> &[String] {
        self.set_problem(problem);
        &self.history[self.history.len() - 1].steps
    }

    pub fn get_hint(&self) -> &str {
        match self.current_problem() {
            None => NO_PROBLEM_MESSAGE,
            Some(problem) => problem.primary_hint().unwrap_or(NO_HINTS_MESSAGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quadratic() -> Problem {
        ProblemEnvironment::create_problem(
            "Solve x**2 - 4 = 0 for positive x",
            "2",
            vec!["Add 4 to both sides".into(), "Take the square root".into()],
            None,
        )
    }

    #[test]
    fn fresh_environment_rejects_everything() {
        let env = ProblemEnvironment::new();

        assert!(!env.verify_solution(""));
        assert!(!env.verify_solution("2"));
        assert_eq!(env.get_hint(), NO_PROBLEM_MESSAGE);
        assert!(env.current_problem().is_none());
    }

    #[test]
    fn verify_ignores_surrounding_whitespace() {
        let mut env = ProblemEnvironment::new();
        env.set_problem(quadratic());

        assert!(env.verify_solution("2"));
        assert!(env.verify_solution("  2\n"));
        assert!(!env.verify_solution("2.0"));
        assert!(!env.verify_solution("-2"));
    }

    #[test]
    fn hint_is_first_step_or_fallback() {
        let mut env = ProblemEnvironment::new();
        env.set_problem(quadratic());
        assert_eq!(env.get_hint(), "Add 4 to both sides");

        env.set_problem(ProblemEnvironment::create_problem("1 + 1?", "2", vec![], None));
        assert_eq!(env.get_hint(), NO_HINTS_MESSAGE);
    }

    #[test]
    fn history_grows_by_one_per_problem() {
        let mut env = ProblemEnvironment::new();
        for expected in 1..=3 {
            env.set_problem(quadratic());
            assert_eq!(env.history().len(), expected);
        }

        let steps = env.step_by_step_solve(quadratic()).to_vec();
        assert_eq!(steps.len(), 2);
        assert_eq!(env.history().len(), 4);
    }

    #[test]
    fn new_problem_replaces_current() {
        let mut env = ProblemEnvironment::new();
        env.set_problem(quadratic());
        env.set_problem(ProblemEnvironment::create_problem("3 * 3?", "9", vec![], None));

        assert!(env.verify_solution("9"));
        assert!(!env.verify_solution("2"));
        assert_eq!(env.history()[0].solution, "2");
    }

    #[test]
    fn create_problem_does_not_set_current() {
        let env = ProblemEnvironment::new();
        let problem = ProblemEnvironment::create_problem("q", "a", vec![], None);

        assert!(problem.variables.is_empty());
        assert!(env.current_problem().is_none());
        assert!(env.history().is_empty());
    }

    #[test]
    fn evaluate_expression_returns_none_on_failure() {
        let env = ProblemEnvironment::new();

        assert_eq!(env.evaluate_expression("2+2"), Some(4.0));
        assert_eq!(env.evaluate_expression("3 - 3"), Some(0.0));
        assert_eq!(env.evaluate_expression("not an expr $$"), None);
        assert_eq!(env.evaluate_expression("x + 1"), None);
    }

    #[test]
    fn pathological_input_is_none() {
        let env = ProblemEnvironment::new();

        assert_eq!(env.evaluate_expression(&"(".repeat(200_000)), None);
        assert_eq!(
            env.evaluate_expression(&format!("{}1", "-".repeat(200_000))),
            None
        );
        assert_eq!(env.evaluate_expression(&format!("{}1", "-".repeat(300))), None);
    }

    #[test]
    fn evaluate_in_context_binds_problem_variables() {
        let mut env = ProblemEnvironment::new();
        assert_eq!(env.evaluate_in_context("x * 2"), None);

        env.set_problem(ProblemEnvironment::create_problem(
            "Double x",
            "6",
            vec![],
            Some(HashMap::from([("x".to_string(), json!(3))])),
        ));

        assert_eq!(env.evaluate_in_context("x * 2"), Some(6.0));
        assert_eq!(env.evaluate_expression("x * 2"), None);
    }
}
