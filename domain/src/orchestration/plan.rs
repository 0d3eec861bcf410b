//! Built-in plan used when no planning collaborator supplies one.

use super::entities::Phase;

/// Analysis → Implementation → Review.
pub fn default_plan(task: &str) -> Vec<Phase> {
    vec![
        Phase::new(
            "Analysis",
            ["planner", "researcher"],
            format!("Analyze the task and plan the approach: {}", task),
        )
        .with_termination_condition("Plan and findings agreed with sufficient confidence"),
        Phase::new(
            "Implementation",
            ["implementer"],
            format!("Implement the planned solution for: {}", task),
        )
        .with_termination_condition("Change produced without critical flags"),
        Phase::new(
            "Review",
            ["reviewer"],
            format!("Review the implementation of: {}", task),
        )
        .with_termination_condition("Reviewer approves with sufficient confidence"),
    ]
}
