use std::sync::Arc;

use crate::config::RelayMode;
use crate::hub::Hub;

#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub relay_mode: RelayMode,
}

impl AppState {
    pub fn new(hub: Hub, relay_mode: RelayMode) -> Self {
        Self {
            hub: Arc::new(hub),
            relay_mode,
        }
    }
}
