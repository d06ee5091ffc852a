use std::sync::Arc;

use jukebox_collab::Collab;

#[derive(Clone)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
}

impl ServerContext {
    pub fn new(collab: Collab) -> Self {
        Self {
            collab: Arc::new(collab),
        }
    }
}
