//! CLI command implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use dmalens_core::{Config, DeviceSession, ShutdownSignal};

pub mod chain;
pub mod hexdump;
pub mod info;
pub mod watch;

/// Open the native transport and resolve the configured target process.
fn open_target(config: &Config, shutdown: &Arc<ShutdownSignal>) -> Result<(DeviceSession, u32)> {
    anyhow::ensure!(
        !config.process_name.is_empty(),
        "no target process configured; set process_name in the config or pass --process"
    );
    let mut session = DeviceSession::open_native(Arc::clone(shutdown))
        .context("failed to open the native transport")?;
    let pid = session
        .process_id(&config.process_name)
        .with_context(|| format!("failed to resolve process {:?}", config.process_name))?;
    Ok((session, pid))
}
