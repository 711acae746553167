//! Watch command: the periodic read/update worker.
//!
//! One dedicated loop owns the session, so no two scatter transfers are
//! ever in flight at once. Startup failures (process or module missing)
//! are retried with a fixed delay; per-tick failures are logged and the
//! next tick tries again; shutdown always terminates the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::ValueEnum;
use dmalens_core::{
    Config, DeviceSession, ScatterMap, ScatterValue, ShutdownSignal, SizeSource, TypeTag,
};
use tracing::{debug, error, info};

use crate::hex_utils::parse_hex_address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchType {
    Ptr,
    I32,
    F32,
    Bool,
}

impl WatchType {
    fn tag(self) -> TypeTag {
        match self {
            WatchType::Ptr => TypeTag::Ptr,
            WatchType::I32 => TypeTag::I32,
            WatchType::F32 => TypeTag::F32,
            WatchType::Bool => TypeTag::Bool,
        }
    }
}

pub fn run(
    config: &Config,
    addresses: &[String],
    watch_type: WatchType,
    deref: Option<&str>,
    shutdown: &Arc<ShutdownSignal>,
) -> Result<()> {
    anyhow::ensure!(
        !config.process_name.is_empty(),
        "no target process configured; set process_name in the config or pass --process"
    );
    let addrs = addresses
        .iter()
        .map(|s| parse_hex_address(s))
        .collect::<Result<Vec<u64>>>()?;
    let deref_offset = match deref {
        Some(s) => {
            anyhow::ensure!(
                watch_type == WatchType::Ptr,
                "--deref requires pointer entries"
            );
            Some(parse_hex_address(s)?)
        }
        None => None,
    };

    let mut session = DeviceSession::open_native(Arc::clone(shutdown))?;

    // Startup loop: wait for the target to show up.
    let pid = loop {
        if shutdown.is_shutdown() {
            return Ok(());
        }
        match session.process_id(&config.process_name) {
            Ok(pid) => break pid,
            Err(e) if e.is_shutdown() => return Ok(()),
            Err(e) => {
                info!(
                    "Target not ready ({e}), retrying in {}s...",
                    config.startup_retry_secs
                );
                if shutdown.wait(Duration::from_secs(config.startup_retry_secs)) {
                    return Ok(());
                }
            }
        }
    };
    info!(pid, "Target located, watching {} address(es)", addrs.len());

    let mut ticks = 0u32;
    let mut window = Instant::now();
    while !shutdown.is_shutdown() {
        match tick(&mut session, pid, &addrs, watch_type, deref_offset) {
            Ok(()) => {}
            Err(e) if e.is_shutdown() => break,
            // Transient cycle failure: log it and try again next tick.
            Err(e) => error!("Read cycle failed: {e}"),
        }

        ticks += 1;
        if window.elapsed() >= Duration::from_secs(1) {
            debug!(ticks, "read cycles in the last second");
            ticks = 0;
            window = Instant::now();
        }

        if shutdown.wait(Duration::from_millis(config.poll_interval_ms)) {
            break;
        }
    }

    info!("Watch loop exiting");
    Ok(())
}

/// One snapshot: a fresh map per tick, one round for the watched values,
/// and an optional second round dereferencing each decoded pointer.
fn tick(
    session: &mut DeviceSession,
    pid: u32,
    addrs: &[u64],
    watch_type: WatchType,
    deref_offset: Option<u64>,
) -> dmalens_core::Result<()> {
    let mut map = ScatterMap::new();

    let mut round = map.add_round();
    let handles: Vec<_> = addrs
        .iter()
        .enumerate()
        .map(|(group, &addr)| round.add_entry(group, 0, addr, watch_type.tag()))
        .collect();

    if let Some(offset) = deref_offset {
        let mut round = map.add_round();
        for (group, handle) in handles.iter().enumerate() {
            round.add_entry_sized(group, 1, *handle, TypeTag::I32, SizeSource::Fixed, offset, 1);
        }
    }

    map.execute(session, pid)?;

    for (group, &addr) in addrs.iter().enumerate() {
        let value = format_value(map.result(group, 0));
        match deref_offset {
            Some(offset) => {
                let derefed = format_value(map.result(group, 1));
                println!("{addr:#x} -> {value}  [+{offset:#x}] -> {derefed}");
            }
            None => println!("{addr:#x} -> {value}"),
        }
    }
    Ok(())
}

fn format_value(value: Option<&ScatterValue>) -> String {
    match value {
        Some(ScatterValue::Ptr(v)) => format!("{v:#x}"),
        Some(ScatterValue::I32(v)) => v.to_string(),
        Some(ScatterValue::F32(v)) => format!("{v:.3}"),
        Some(ScatterValue::Bool(v)) => v.to_string(),
        Some(other) => format!("{other:?}"),
        None => "<unreadable>".to_string(),
    }
}
