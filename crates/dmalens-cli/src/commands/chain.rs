//! Chain command: walk a pointer chain from the module base.

use std::sync::Arc;

use anyhow::{Context, Result};
use dmalens_core::{Config, ShutdownSignal};
use owo_colors::OwoColorize;

use crate::hex_utils::parse_offset_list;

pub fn run(config: &Config, offsets: &str, shutdown: &Arc<ShutdownSignal>) -> Result<()> {
    let offsets = parse_offset_list(offsets)?;
    anyhow::ensure!(!offsets.is_empty(), "no offsets given");
    anyhow::ensure!(
        !config.module_name.is_empty(),
        "no module configured; set module_name in the config"
    );

    let (mut session, pid) = super::open_target(config, shutdown)?;
    let base = session.module_base(pid, &config.module_name)?;
    println!("{} {:#x} ({})", "base:".dimmed(), base, config.module_name);

    let value = session
        .read_ptr_chain(pid, base, &offsets)
        .context("pointer chain did not resolve")?;
    println!("{} {:#x}", "resolved:".dimmed(), value.green());

    Ok(())
}
