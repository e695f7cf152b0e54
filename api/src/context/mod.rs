use std::sync::Arc;

use tether_db::storage::Storage;
use tether_pce::PolicyController;

#[derive(Clone)]
pub struct ApiContext {
    pub db: Arc<dyn Storage>,
    pub controller: Arc<dyn PolicyController>,
}

impl ApiContext {
    pub fn new(db: Arc<dyn Storage>, controller: Arc<dyn PolicyController>) -> Self {
        Self { db, controller }
    }
}
