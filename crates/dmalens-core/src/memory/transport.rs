//! Transport contract for the DMA / native layer.

use crate::error::Result;
use crate::memory::paging::PAGE_SIZE;

/// One page-sized unit of a scatter transfer.
///
/// A page either fully succeeds or fully fails; there is no partial page.
#[derive(Debug, Clone)]
pub struct PageRead {
    /// Page-aligned virtual address this buffer was read from.
    pub address: u64,
    /// Whether the physical transfer of this page succeeded.
    pub ok: bool,
    /// Page contents, `PAGE_SIZE` bytes when `ok` is set.
    pub bytes: Vec<u8>,
}

impl PageRead {
    pub fn succeeded(address: u64, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len() as u64, PAGE_SIZE);
        Self {
            address,
            ok: true,
            bytes,
        }
    }

    pub fn failed(address: u64) -> Self {
        Self {
            address,
            ok: false,
            bytes: Vec::new(),
        }
    }
}

/// Low-level access to a target's virtual address space.
///
/// [`DeviceSession`](crate::DeviceSession) is the only consumer.
/// Implementations: the usermode Windows backend, hardware DMA devices,
/// and the in-memory test mock.
pub trait DmaTransport: Send {
    /// Resolve a process id from an executable name.
    fn pid_by_name(&mut self, name: &str) -> Result<u32>;

    /// Resolve the base address of a loaded module.
    fn module_base(&mut self, pid: u32, module: &str) -> Result<u64>;

    /// Fetch each page-aligned address in `pages` in one round trip.
    ///
    /// Per-page failures are reported through [`PageRead::ok`], never as
    /// an `Err`; an `Err` means the device itself is unusable.
    fn scatter_read(&mut self, pid: u32, pages: &[u64]) -> Result<Vec<PageRead>>;

    /// Contiguous read into `buf`. Returns the number of bytes actually
    /// read, which may fall short of `buf.len()` on unreadable memory.
    fn read(&mut self, pid: u32, addr: u64, buf: &mut [u8]) -> Result<usize>;

    /// Release the underlying device. Called once by the session.
    fn close(&mut self);
}
