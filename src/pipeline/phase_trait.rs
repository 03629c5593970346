use super::context::PipelineContext;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait WorkflowPhase: Send + Sync {
    async fn execute(&self, context: &mut PipelineContext) -> Result<()>;
}
