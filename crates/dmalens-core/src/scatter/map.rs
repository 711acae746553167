//! Declarative builder for one scatter snapshot.
//!
//! A map is created fresh for each logical snapshot, filled with rounds
//! and entries, executed once, then discarded after its results are
//! consumed.

use std::collections::HashMap;

use crate::error::Result;
use crate::memory::DeviceSession;
use crate::scatter::entry::{
    AddressSource, EntryHandle, ScatterEntry, ScatterValue, SizeSource, TypeTag,
};
use crate::scatter::executor;

/// Top-level definition of a scatter read operation.
#[derive(Default)]
pub struct ScatterMap {
    pub(crate) entries: Vec<ScatterEntry>,
    pub(crate) rounds: Vec<Vec<EntryHandle>>,
    index: HashMap<(usize, u32), EntryHandle>,
}

impl ScatterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new round. Rounds execute strictly in creation order, so
    /// entries may reference results from any earlier round.
    pub fn add_round(&mut self) -> ScatterRound<'_> {
        self.rounds.push(Vec::new());
        let round = self.rounds.len() - 1;
        ScatterRound { map: self, round }
    }

    /// Execute all rounds in order against `session`.
    ///
    /// Per-entry failures become null results; only shutdown and fatal
    /// transport errors propagate.
    pub fn execute(&mut self, session: &mut DeviceSession, pid: u32) -> Result<()> {
        for round in 0..self.rounds.len() {
            executor::run_round(self, round, session, pid)?;
        }
        Ok(())
    }

    /// Decoded result for `(group, id)`, or `None` for unknown keys and
    /// for entries that were skipped or failed.
    pub fn result(&self, group: usize, id: u32) -> Option<&ScatterValue> {
        let handle = self.index.get(&(group, id))?;
        self.entries[handle.0].result()
    }

    pub fn entry(&self, handle: EntryHandle) -> &ScatterEntry {
        &self.entries[handle.0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One batch of mutually independent entries, satisfied by a single
/// physical transfer.
pub struct ScatterRound<'m> {
    map: &'m mut ScatterMap,
    round: usize,
}

impl ScatterRound<'_> {
    /// Add an entry whose size is the tag's intrinsic size.
    pub fn add_entry(
        &mut self,
        group: usize,
        id: u32,
        addr: impl Into<AddressSource>,
        tag: TypeTag,
    ) -> EntryHandle {
        self.add_entry_sized(group, id, addr, tag, SizeSource::Fixed, 0, 1)
    }

    /// Add an entry with an explicit size source, address offset, and
    /// size multiplier.
    ///
    /// Entry references are only valid across rounds: a round executes as
    /// one transfer with no ordering among its entries.
    pub fn add_entry_sized(
        &mut self,
        group: usize,
        id: u32,
        addr: impl Into<AddressSource>,
        tag: TypeTag,
        size: impl Into<SizeSource>,
        offset: u64,
        size_mult: usize,
    ) -> EntryHandle {
        let addr = addr.into();
        let size = size.into();
        debug_assert!(
            self.reference_is_from_earlier_round(addr_reference(&addr)),
            "address source must reference an earlier round"
        );
        debug_assert!(
            self.reference_is_from_earlier_round(size_reference(&size)),
            "size source must reference an earlier round"
        );

        let handle = EntryHandle(self.map.entries.len());
        self.map.entries.push(ScatterEntry {
            group,
            id,
            addr,
            offset,
            size,
            size_mult,
            tag,
            result: None,
        });
        self.map.rounds[self.round].push(handle);
        self.map.index.insert((group, id), handle);
        handle
    }

    fn reference_is_from_earlier_round(&self, reference: Option<EntryHandle>) -> bool {
        match reference {
            Some(handle) => (0..self.round).any(|r| self.map.rounds[r].contains(&handle)),
            None => true,
        }
    }
}

fn addr_reference(source: &AddressSource) -> Option<EntryHandle> {
    match source {
        AddressSource::FromEntry(handle) => Some(*handle),
        AddressSource::Literal(_) => None,
    }
}

fn size_reference(source: &SizeSource) -> Option<EntryHandle> {
    match source {
        SizeSource::FromEntry(handle) => Some(*handle),
        SizeSource::Fixed | SizeSource::Literal(_) => None,
    }
}
