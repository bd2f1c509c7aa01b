use std::sync::Arc;

use crate::pipeline::orchestrator::Pipeline;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: Arc<Pipeline>,
}

impl ApiContext {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}
