//! Info command: resolve the target process and module base.

use std::sync::Arc;

use anyhow::Result;
use dmalens_core::{Config, ShutdownSignal};
use owo_colors::OwoColorize;

pub fn run(config: &Config, module: Option<&str>, shutdown: &Arc<ShutdownSignal>) -> Result<()> {
    let (mut session, pid) = super::open_target(config, shutdown)?;

    println!("{} {}", "process:".dimmed(), config.process_name);
    println!("{} {}", "pid:".dimmed(), pid.green());

    let module = module.unwrap_or(&config.module_name);
    if module.is_empty() {
        println!("{}", "no module configured, skipping base lookup".dimmed());
        return Ok(());
    }

    let base = session.module_base(pid, module)?;
    println!("{} {}", "module:".dimmed(), module);
    println!("{} {:#x}", "base:".dimmed(), base.green());

    Ok(())
}
