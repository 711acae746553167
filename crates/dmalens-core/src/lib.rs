//! # dmalens-core
//!
//! Batched inspection of a live external process's memory over a
//! DMA-style transport, with no agent inside the target.
//!
//! This crate provides:
//! - A scatter-read engine that coalesces many typed read requests into
//!   deduplicated page transfers, tolerating per-page failure
//! - A device session wrapping the native transport with fail-fast
//!   shutdown semantics
//! - Typed decoding of raw page buffers into a small closed value set
//! - Pointer-chain resolution built on single-value reads
//!
//! The engine performs no retries of its own: per-entry failures surface
//! as null results and the retry policy lives in the caller's loop.

pub mod config;
pub mod error;
pub mod memory;
pub mod scatter;
pub mod shutdown;

pub use config::Config;
pub use error::{Error, Result};
pub use memory::paging::{PAGE_SHIFT, PAGE_SIZE, byte_offset, page_align, span_pages};
pub use memory::{DEFAULT_MAX_READ_PAGES, DeviceSession, DmaTransport, PageRead};
pub use scatter::{
    AddressSource, EntryHandle, ScatterEntry, ScatterMap, ScatterRound, ScatterValue, SizeSource,
    TypeTag,
};
pub use shutdown::ShutdownSignal;

#[cfg(target_os = "windows")]
pub use memory::Win32Transport;
