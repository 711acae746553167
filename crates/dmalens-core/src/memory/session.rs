//! Device session lifecycle around the native transport.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::memory::paging::PAGE_SIZE;
use crate::memory::transport::{DmaTransport, PageRead};
use crate::scatter::decode;
use crate::shutdown::ShutdownSignal;

/// Default cap on contiguous reads, in pages.
pub const DEFAULT_MAX_READ_PAGES: usize = 1500;

/// Open connection to the DMA transport, scoped to one target process at
/// a time by its callers.
///
/// Every public call first checks the shared shutdown signal and fails
/// fast with [`Error::ShuttingDown`]; that error always propagates to the
/// top of the caller's loop and is never retried.
pub struct DeviceSession {
    transport: Box<dyn DmaTransport>,
    shutdown: Arc<ShutdownSignal>,
    max_read_bytes: usize,
    closed: bool,
}

impl DeviceSession {
    pub fn open(transport: Box<dyn DmaTransport>, shutdown: Arc<ShutdownSignal>) -> Self {
        Self::with_read_bound(transport, shutdown, DEFAULT_MAX_READ_PAGES)
    }

    /// Open with a custom bound on contiguous reads.
    pub fn with_read_bound(
        transport: Box<dyn DmaTransport>,
        shutdown: Arc<ShutdownSignal>,
        max_read_pages: usize,
    ) -> Self {
        Self {
            transport,
            shutdown,
            max_read_bytes: max_read_pages * PAGE_SIZE as usize,
            closed: false,
        }
    }

    /// Open the platform's native transport.
    #[cfg(target_os = "windows")]
    pub fn open_native(shutdown: Arc<ShutdownSignal>) -> Result<Self> {
        let transport = crate::memory::win32::Win32Transport::open()?;
        Ok(Self::open(Box::new(transport), shutdown))
    }

    #[cfg(not(target_os = "windows"))]
    pub fn open_native(_shutdown: Arc<ShutdownSignal>) -> Result<Self> {
        Err(Error::DeviceInit(
            "no native transport on this platform".to_string(),
        ))
    }

    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.shutdown)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.closed || self.shutdown.is_shutdown() {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    /// Resolve the target process id from its executable name.
    pub fn process_id(&mut self, name: &str) -> Result<u32> {
        self.ensure_running()?;
        let pid = self.transport.pid_by_name(name)?;
        debug!(name, pid, "resolved target process");
        Ok(pid)
    }

    /// Resolve the base address of a module loaded in the target.
    pub fn module_base(&mut self, pid: u32, module: &str) -> Result<u64> {
        self.ensure_running()?;
        let base = self.transport.module_base(pid, module)?;
        debug!(module, base = format_args!("{base:#x}"), "resolved module");
        Ok(base)
    }

    /// One physical scatter transfer of the given page-aligned addresses,
    /// keyed by page address on return. Per-page failures are reported in
    /// the returned [`PageRead`]s, not as an error.
    pub fn read_scatter_pages(
        &mut self,
        pid: u32,
        pages: &[u64],
    ) -> Result<HashMap<u64, PageRead>> {
        self.ensure_running()?;
        let reads = self.transport.scatter_read(pid, pages)?;
        Ok(reads.into_iter().map(|r| (r.address, r)).collect())
    }

    /// Contiguous read of `size` bytes, bounded to the configured maximum
    /// number of pages.
    pub fn read_buffer(&mut self, pid: u32, addr: u64, size: usize) -> Result<Vec<u8>> {
        self.ensure_running()?;
        if size > self.max_read_bytes {
            return Err(Error::OversizedRequest {
                size,
                max: self.max_read_bytes,
            });
        }
        let mut buf = vec![0u8; size];
        let copied = self.transport.read(pid, addr, &mut buf)?;
        if copied != size {
            return Err(Error::IncompleteRead {
                address: addr,
                expected: size,
                actual: copied,
            });
        }
        Ok(buf)
    }

    pub fn read_u64(&mut self, pid: u32, addr: u64) -> Result<u64> {
        let buf = self.read_buffer(pid, addr, 8)?;
        Ok(u64::from_le_bytes(fixed(addr, &buf)?))
    }

    pub fn read_i32(&mut self, pid: u32, addr: u64) -> Result<i32> {
        let buf = self.read_buffer(pid, addr, 4)?;
        Ok(i32::from_le_bytes(fixed(addr, &buf)?))
    }

    pub fn read_f32(&mut self, pid: u32, addr: u64) -> Result<f32> {
        let buf = self.read_buffer(pid, addr, 4)?;
        Ok(f32::from_le_bytes(fixed(addr, &buf)?))
    }

    /// Read `len` bytes and decode them as a narrow string, truncated at
    /// the first terminator. Bounded to one page.
    pub fn read_string(&mut self, pid: u32, addr: u64, len: usize) -> Result<String> {
        if len as u64 > PAGE_SIZE {
            return Err(Error::OversizedRequest {
                size: len,
                max: PAGE_SIZE as usize,
            });
        }
        let buf = self.read_buffer(pid, addr, len)?;
        Ok(decode::decode_narrow(&buf))
    }

    /// Read a wide (UTF-16) string object whose character count sits at
    /// `addr + len_offset` and whose data starts at `addr + data_offset`.
    pub fn read_wide_string(
        &mut self,
        pid: u32,
        addr: u64,
        len_offset: u64,
        data_offset: u64,
    ) -> Result<String> {
        let chars = self.read_i32(pid, addr + len_offset)?;
        let byte_len = (chars.max(0) as usize).saturating_mul(2);
        if byte_len as u64 > PAGE_SIZE {
            return Err(Error::OversizedRequest {
                size: byte_len,
                max: PAGE_SIZE as usize,
            });
        }
        let buf = self.read_buffer(pid, addr + data_offset, byte_len)?;
        decode::decode_wide(&buf)
    }

    /// Release the transport. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport.close();
            debug!("device session closed");
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn fixed<const N: usize>(addr: u64, buf: &[u8]) -> Result<[u8; N]> {
    buf.try_into().map_err(|_| Error::IncompleteRead {
        address: addr,
        expected: N,
        actual: buf.len(),
    })
}
