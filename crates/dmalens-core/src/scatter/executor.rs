//! Round execution: resolve, prune, coalesce, transfer, demultiplex.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::memory::paging::{PAGE_SIZE, byte_offset, page_align, span_pages};
use crate::memory::{DeviceSession, PageRead};
use crate::scatter::decode::decode;
use crate::scatter::entry::{AddressSource, EntryHandle, ScatterValue, SizeSource};
use crate::scatter::map::ScatterMap;

struct PlannedRead {
    handle: EntryHandle,
    addr: u64,
    size: usize,
}

/// Run one round of `map` as a single physical transfer.
///
/// Designed to complete as many entries as possible even when some fail:
/// skipped and failed entries keep a null result, and only shutdown or a
/// fatal transport error aborts the round.
pub(crate) fn run_round(
    map: &mut ScatterMap,
    round: usize,
    session: &mut DeviceSession,
    pid: u32,
) -> Result<()> {
    let handles = map.rounds[round].clone();

    // Resolve every entry's effective address and size before anything
    // touches the transport. References into earlier rounds are already
    // settled; a failed reference resolves to zero and prunes the entry.
    let mut planned = Vec::with_capacity(handles.len());
    for handle in handles {
        let entry = &map.entries[handle.0];
        let base = match entry.addr {
            AddressSource::Literal(addr) => addr,
            AddressSource::FromEntry(dep) => map.entries[dep.0]
                .result()
                .and_then(ScatterValue::as_address)
                .unwrap_or(0),
        };
        let size = match entry.size {
            SizeSource::Fixed => entry.tag.fixed_size().unwrap_or(0),
            SizeSource::Literal(n) => n,
            SizeSource::FromEntry(dep) => map.entries[dep.0]
                .result()
                .and_then(ScatterValue::as_size)
                .unwrap_or(0),
        }
        .saturating_mul(entry.size_mult);

        if base == 0 || size == 0 || size as u64 > PAGE_SIZE {
            trace!(
                group = entry.group,
                id = entry.id,
                size,
                "entry pruned before transfer"
            );
            continue;
        }

        planned.push(PlannedRead {
            handle,
            addr: base.wrapping_add(entry.offset),
            size,
        });
    }

    // Each unique page is fetched exactly once, no matter how many
    // entries' ranges fall inside it.
    let mut pages = BTreeSet::new();
    for read in &planned {
        let first = page_align(read.addr);
        for n in 0..span_pages(read.addr, read.size as u64) {
            pages.insert(first + n * PAGE_SIZE);
        }
    }
    let pages: Vec<u64> = pages.into_iter().collect();

    // An all-pruned round has nothing to transfer.
    let fetched = if pages.is_empty() {
        HashMap::new()
    } else {
        session.read_scatter_pages(pid, &pages)?
    };

    for read in planned {
        let entry = &map.entries[read.handle.0];
        let (tag, group, id) = (entry.tag, entry.group, entry.id);
        match assemble(&fetched, read.addr, read.size).and_then(|buf| decode(tag, &buf)) {
            Ok(value) => map.entries[read.handle.0].result = Some(value),
            Err(e) => {
                debug!(
                    group,
                    id,
                    addr = format_args!("{:#x}", read.addr),
                    error = %e,
                    "scatter entry failed"
                );
            }
        }
    }
    Ok(())
}

/// Copy an entry's byte range out of the fetched pages, walking its
/// spanned pages in order. Any failed or missing page fails the whole
/// entry; the buffer is complete or not produced at all.
fn assemble(fetched: &HashMap<u64, PageRead>, addr: u64, size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(size);
    let mut offset = byte_offset(addr) as usize;
    let first = page_align(addr);

    for n in 0..span_pages(addr, size as u64) {
        let page_addr = first + n * PAGE_SIZE;
        let page = fetched
            .get(&page_addr)
            .filter(|p| p.ok)
            .ok_or(Error::PageFault { address: page_addr })?;
        let take = (size - buf.len()).min(PAGE_SIZE as usize - offset);
        buf.extend_from_slice(&page.bytes[offset..offset + take]);
        offset = 0;
    }

    if buf.len() != size {
        return Err(Error::IncompleteRead {
            address: addr,
            expected: size,
            actual: buf.len(),
        });
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::memory::DeviceSession;
    use crate::memory::mock::{MOCK_PID, MockLog, MockMemoryBuilder};
    use crate::memory::paging::PAGE_SIZE;
    use crate::scatter::entry::{SizeSource, TypeTag};
    use crate::scatter::map::ScatterMap;
    use crate::shutdown::ShutdownSignal;

    fn session_with(builder: MockMemoryBuilder) -> (DeviceSession, MockLog) {
        let (transport, log) = builder.build();
        let session = DeviceSession::open(Box::new(transport), Arc::new(ShutdownSignal::new()));
        (session, log)
    }

    #[test]
    fn test_entries_on_one_page_fetch_it_once() {
        let (mut session, log) = session_with(
            MockMemoryBuilder::new()
                .write_i32(0x1000, 1)
                .write_i32(0x1100, 2)
                .write_i32(0x1F00, 3),
        );

        let mut map = ScatterMap::new();
        let mut round = map.add_round();
        round.add_entry(0, 0, 0x1000u64, TypeTag::I32);
        round.add_entry(1, 0, 0x1100u64, TypeTag::I32);
        round.add_entry(2, 0, 0x1F00u64, TypeTag::I32);
        map.execute(&mut session, MOCK_PID).unwrap();

        let calls = log.scatter_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![0x1000]);
        assert_eq!(map.result(0, 0).unwrap().as_i32(), Some(1));
        assert_eq!(map.result(1, 0).unwrap().as_i32(), Some(2));
        assert_eq!(map.result(2, 0).unwrap().as_i32(), Some(3));
    }

    #[test]
    fn test_entry_straddling_a_boundary_fetches_both_pages() {
        let value = 0x1122_3344_5566_7788u64;
        let (mut session, log) =
            session_with(MockMemoryBuilder::new().write_u64(0x2000 - 2, value));

        let mut map = ScatterMap::new();
        map.add_round().add_entry(0, 0, 0x2000u64 - 2, TypeTag::Ptr);
        map.execute(&mut session, MOCK_PID).unwrap();

        assert_eq!(log.scatter_calls()[0], vec![0x1000, 0x2000]);
        assert_eq!(map.result(0, 0).unwrap().as_ptr(), Some(value));
    }

    #[test]
    fn test_zero_address_entry_never_reaches_the_transport() {
        let (mut session, log) = session_with(MockMemoryBuilder::new());

        let mut map = ScatterMap::new();
        map.add_round().add_entry(0, 0, 0u64, TypeTag::I32);
        map.execute(&mut session, MOCK_PID).unwrap();

        assert!(map.result(0, 0).is_none());
        assert_eq!(log.scatter_call_count(), 0);
    }

    #[test]
    fn test_oversized_entry_is_skipped() {
        let (mut session, log) = session_with(MockMemoryBuilder::new());

        let mut map = ScatterMap::new();
        map.add_round().add_entry_sized(
            0,
            0,
            0x1000u64,
            TypeTag::Bytes,
            PAGE_SIZE as usize + 1,
            0,
            1,
        );
        map.execute(&mut session, MOCK_PID).unwrap();

        assert!(map.result(0, 0).is_none());
        assert_eq!(log.scatter_call_count(), 0);
    }

    #[test]
    fn test_dependency_on_failed_entry_is_skipped() {
        // Round 1 reads a null pointer; the round 2 entry referencing it
        // must resolve to address 0 and never hit the transport.
        let (mut session, log) =
            session_with(MockMemoryBuilder::new().write_u64(0x1000, 0));

        let mut map = ScatterMap::new();
        let parent = map.add_round().add_entry(0, 0, 0x1000u64, TypeTag::Ptr);
        map.add_round()
            .add_entry_sized(0, 1, parent, TypeTag::I32, SizeSource::Fixed, 0x10, 1);
        map.execute(&mut session, MOCK_PID).unwrap();

        assert!(map.result(0, 0).is_none());
        assert!(map.result(0, 1).is_none());
        // Round 1 fetched its page; round 2 had nothing left to transfer.
        let calls = log.scatter_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![0x1000]);
    }

    #[test]
    fn test_page_failure_only_affects_spanning_entries() {
        let (mut session, _log) = session_with(
            MockMemoryBuilder::new()
                .write_i32(0x1000, 11)
                .fail_page(0x5000),
        );

        let mut map = ScatterMap::new();
        let mut round = map.add_round();
        round.add_entry(0, 0, 0x1000u64, TypeTag::I32);
        round.add_entry(1, 0, 0x5000u64, TypeTag::I32);
        map.execute(&mut session, MOCK_PID).unwrap();

        assert_eq!(map.result(0, 0).unwrap().as_i32(), Some(11));
        assert!(map.result(1, 0).is_none());
    }

    #[test]
    fn test_size_from_entry_with_multiplier() {
        // Round 1 reads a character count; round 2 reads count * 2 bytes
        // of UTF-16 data.
        let text: Vec<u8> = "scout".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let (mut session, _log) = session_with(
            MockMemoryBuilder::new()
                .write_i32(0x1000, 5)
                .write_u64(0x1008, 0x3000)
                .write_bytes(0x3000, &text),
        );

        let mut map = ScatterMap::new();
        let mut round1 = map.add_round();
        let count = round1.add_entry(0, 0, 0x1000u64, TypeTag::I32);
        let data = round1.add_entry(0, 1, 0x1008u64, TypeTag::Ptr);
        map.add_round()
            .add_entry_sized(0, 2, data, TypeTag::WStr, count, 0, 2);
        map.execute(&mut session, MOCK_PID).unwrap();

        assert_eq!(map.result(0, 2).unwrap().as_str(), Some("scout"));
    }

    #[test]
    fn test_shutdown_aborts_execute() {
        let (mut session, log) =
            session_with(MockMemoryBuilder::new().write_i32(0x1000, 1));
        session.shutdown_signal().trigger();

        let mut map = ScatterMap::new();
        map.add_round().add_entry(0, 0, 0x1000u64, TypeTag::I32);
        let err = map.execute(&mut session, MOCK_PID).unwrap_err();
        assert!(err.is_shutdown());
        assert_eq!(log.scatter_call_count(), 0);
    }

    #[test]
    fn test_two_round_snapshot_end_to_end() {
        // Entry A: pointer at 0x1000 -> 0x2000. Entry B: i32 at A + 0x10.
        // Entry C: pointer at 0x5000, whose page fails. Expected results:
        // A = 0x2000, B = 42, C = null.
        let (mut session, log) = session_with(
            MockMemoryBuilder::new()
                .write_u64(0x1000, 0x2000)
                .write_i32(0x2010, 42)
                .fail_page(0x5000),
        );

        let mut map = ScatterMap::new();
        let mut round1 = map.add_round();
        let a = round1.add_entry(0, 0, 0x1000u64, TypeTag::Ptr);
        round1.add_entry(0, 2, 0x5000u64, TypeTag::Ptr);
        map.add_round()
            .add_entry_sized(0, 1, a, TypeTag::I32, SizeSource::Fixed, 0x10, 1);
        map.execute(&mut session, MOCK_PID).unwrap();

        assert_eq!(map.result(0, 0).unwrap().as_ptr(), Some(0x2000));
        assert_eq!(map.result(0, 1).unwrap().as_i32(), Some(42));
        assert!(map.result(0, 2).is_none());

        // Two rounds, two physical transfers; round 1 deduplicated its
        // pages across both entries.
        let calls = log.scatter_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], vec![0x1000, 0x5000]);
        assert_eq!(calls[1], vec![0x2000]);
    }

    #[test]
    fn test_every_entry_has_a_recorded_outcome() {
        let (mut session, _log) = session_with(
            MockMemoryBuilder::new()
                .write_u64(0x1000, 0x2000)
                .fail_page(0x4000),
        );

        let mut map = ScatterMap::new();
        let mut round = map.add_round();
        round.add_entry(0, 0, 0x1000u64, TypeTag::Ptr); // decodes
        round.add_entry(0, 1, 0x4000u64, TypeTag::Ptr); // page fault
        round.add_entry(0, 2, 0u64, TypeTag::Ptr); // pruned
        map.execute(&mut session, MOCK_PID).unwrap();

        assert_eq!(map.len(), 3);
        assert!(map.result(0, 0).is_some());
        assert!(map.result(0, 1).is_none());
        assert!(map.result(0, 2).is_none());
    }
}
