//! In-memory transport fake for engine tests.
//!
//! Pages are seeded through [`MockMemoryBuilder`]; every scatter call is
//! recorded so tests can assert on the exact page set that hit the wire.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::memory::paging::{PAGE_SIZE, byte_offset, page_align};
use crate::memory::transport::{DmaTransport, PageRead};

pub const MOCK_PID: u32 = 0x1337;

#[derive(Default)]
struct MockState {
    /// Page-aligned address -> full page contents.
    pages: HashMap<u64, Vec<u8>>,
    /// Pages that report a failed physical transfer.
    failing: HashSet<u64>,
    processes: HashMap<String, u32>,
    modules: HashMap<(u32, String), u64>,
    scatter_calls: Vec<Vec<u64>>,
    closed: bool,
}

pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Test-side view of the transport's recorded activity.
#[derive(Clone)]
pub struct MockLog {
    state: Arc<Mutex<MockState>>,
}

impl MockLog {
    /// Page sets requested by each scatter transfer, in call order.
    pub fn scatter_calls(&self) -> Vec<Vec<u64>> {
        self.state.lock().unwrap().scatter_calls.clone()
    }

    pub fn scatter_call_count(&self) -> usize {
        self.state.lock().unwrap().scatter_calls.len()
    }

    pub fn closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

/// Builder seeding the fake address space.
#[derive(Default)]
pub struct MockMemoryBuilder {
    state: MockState,
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(mut self, name: &str, pid: u32) -> Self {
        self.state.processes.insert(name.to_string(), pid);
        self
    }

    pub fn module(mut self, pid: u32, name: &str, base: u64) -> Self {
        self.state.modules.insert((pid, name.to_string()), base);
        self
    }

    /// Write bytes at an arbitrary address, splitting across pages and
    /// zero-filling any page touched for the first time.
    pub fn write_bytes(mut self, addr: u64, bytes: &[u8]) -> Self {
        let mut page = page_align(addr);
        let mut offset = byte_offset(addr) as usize;
        let mut remaining = bytes;
        while !remaining.is_empty() {
            let slot = self
                .state
                .pages
                .entry(page)
                .or_insert_with(|| vec![0u8; PAGE_SIZE as usize]);
            let take = remaining.len().min(PAGE_SIZE as usize - offset);
            slot[offset..offset + take].copy_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            page += PAGE_SIZE;
            offset = 0;
        }
        self
    }

    pub fn write_u64(self, addr: u64, value: u64) -> Self {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    pub fn write_i32(self, addr: u64, value: i32) -> Self {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    pub fn write_f32(self, addr: u64, value: f32) -> Self {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    /// Make the page containing `addr` readable but mark its physical
    /// transfer as failed.
    pub fn fail_page(mut self, addr: u64) -> Self {
        let page = page_align(addr);
        self.state
            .pages
            .entry(page)
            .or_insert_with(|| vec![0u8; PAGE_SIZE as usize]);
        self.state.failing.insert(page);
        self
    }

    pub fn build(self) -> (MockTransport, MockLog) {
        let state = Arc::new(Mutex::new(self.state));
        (
            MockTransport {
                state: Arc::clone(&state),
            },
            MockLog { state },
        )
    }
}

impl DmaTransport for MockTransport {
    fn pid_by_name(&mut self, name: &str) -> Result<u32> {
        let state = self.state.lock().unwrap();
        state
            .processes
            .get(name)
            .copied()
            .ok_or_else(|| crate::Error::ProcessNotFound(name.to_string()))
    }

    fn module_base(&mut self, pid: u32, module: &str) -> Result<u64> {
        let state = self.state.lock().unwrap();
        state
            .modules
            .get(&(pid, module.to_string()))
            .copied()
            .ok_or_else(|| crate::Error::ModuleNotFound {
                pid,
                module: module.to_string(),
            })
    }

    fn scatter_read(&mut self, _pid: u32, pages: &[u64]) -> Result<Vec<PageRead>> {
        let mut state = self.state.lock().unwrap();
        state.scatter_calls.push(pages.to_vec());
        Ok(pages
            .iter()
            .map(|&page| {
                if state.failing.contains(&page) {
                    PageRead::failed(page)
                } else {
                    match state.pages.get(&page) {
                        Some(bytes) => PageRead::succeeded(page, bytes.clone()),
                        None => PageRead::failed(page),
                    }
                }
            })
            .collect())
    }

    fn read(&mut self, _pid: u32, addr: u64, buf: &mut [u8]) -> Result<usize> {
        let state = self.state.lock().unwrap();
        let mut copied = 0usize;
        let mut page = page_align(addr);
        let mut offset = byte_offset(addr) as usize;
        while copied < buf.len() {
            if state.failing.contains(&page) {
                break;
            }
            let Some(bytes) = state.pages.get(&page) else {
                break;
            };
            let take = (buf.len() - copied).min(PAGE_SIZE as usize - offset);
            buf[copied..copied + take].copy_from_slice(&bytes[offset..offset + take]);
            copied += take;
            page += PAGE_SIZE;
            offset = 0;
        }
        Ok(copied)
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closed = true;
    }
}
