use std::sync::Arc;

use crate::db::ImpressionStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ImpressionStore>,
    pub max_inflated_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn ImpressionStore>, max_inflated_bytes: usize) -> Self {
        Self {
            store,
            max_inflated_bytes,
        }
    }
}
