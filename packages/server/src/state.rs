use std::sync::Arc;

use oai_harvest::HarvestEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<HarvestEngine>,
}

impl AppState {
    pub fn new(engine: HarvestEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}
