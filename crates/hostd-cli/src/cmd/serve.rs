use anyhow::{anyhow, Result};
use hostd_core::config::{HostdConfig, WarnLevel};

pub fn run(config: &HostdConfig) -> Result<()> {
    for w in config.validate() {
        match w.level {
            WarnLevel::Error => return Err(anyhow!("invalid config: {}", w.message)),
            WarnLevel::Warning => tracing::warn!("{}", w.message),
        }
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(hostd_server::serve(config))
}
