//! Planning port
//!
//! The planning collaborator turns a task into an ordered phase list.

use async_trait::async_trait;
use concord_domain::{ContextMap, Phase, default_plan};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Planning failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, task: &str, context: &ContextMap) -> Result<Vec<Phase>, PlannerError>;
}

/// Returns the built-in three-phase plan with the given confidence threshold.
pub struct DefaultPlanner {
    confidence_threshold: f64,
}

impl DefaultPlanner {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
        }
    }
}

#[async_trait]
impl Planner for DefaultPlanner {
    async fn plan(&self, task: &str, _context: &ContextMap) -> Result<Vec<Phase>, PlannerError> {
        Ok(default_plan(task)
            .into_iter()
            .map(|p| p.with_confidence_threshold(self.confidence_threshold))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_planner_applies_threshold() {
        let planner = DefaultPlanner::new(0.7);
        let phases = planner.plan("Implement X", &ContextMap::new()).await.unwrap();
        assert_eq!(phases.len(), 3);
        assert!(phases.iter().all(|p| p.confidence_threshold == 0.7));
    }
}
