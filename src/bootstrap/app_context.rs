use crate::bootstrap::config::Config;
use crate::infrastructure::realtime::Hub;

/// Process-wide state built once at startup: the environment configuration
/// and the realtime hub. Route registrations receive a clone instead of
/// reaching for globals.
#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    hub: Hub,
}

impl AppContext {
    pub fn new(cfg: Config, hub: Hub) -> Self {
        Self { cfg, hub }
    }

    pub fn hub(&self) -> Hub {
        self.hub.clone()
    }
}
