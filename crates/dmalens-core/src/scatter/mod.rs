//! Batched scatter-read engine.
//!
//! Callers describe one snapshot as a [`ScatterMap`] of rounds; each
//! round's entries are mutually independent and satisfied by a single
//! physical page transfer, with pages deduplicated across the round.
//! Entries may use an earlier round's results as their address or size.

pub mod decode;

mod entry;
mod executor;
mod map;

pub use entry::{AddressSource, EntryHandle, ScatterEntry, ScatterValue, SizeSource, TypeTag};
pub use map::{ScatterMap, ScatterRound};
