use hostd_core::action::ActionRegistry;
use hostd_core::config::HostdConfig;
use hostd_core::engine::Engine;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Stock registry wired to the configured shed script.
    pub fn from_config(config: &HostdConfig) -> Self {
        Self::new(Engine::new(ActionRegistry::gpu_shed(&config.gpu_shed_script)))
    }
}
