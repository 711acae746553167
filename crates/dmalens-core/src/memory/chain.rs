//! Pointer-chain dereferencing built on single-value reads.
//!
//! Independent of the round/entry machinery: each hop is one read through
//! the session, so a chain is inherently sequential.

use crate::error::{Error, Result};
use crate::memory::session::DeviceSession;

impl DeviceSession {
    /// Dereference a pointer. A stored zero is an expected outcome for
    /// optional objects and surfaces as [`Error::NullPointer`], not as a
    /// transfer fault.
    pub fn read_ptr(&mut self, pid: u32, addr: u64) -> Result<u64> {
        let value = self.read_u64(pid, addr)?;
        if value == 0 {
            return Err(Error::NullPointer);
        }
        Ok(value)
    }

    /// Follow `base + offsets[0] -> .. -> + offsets[n-1]`, returning the
    /// final pointer value.
    ///
    /// A failing hop is wrapped with its index and the addresses involved;
    /// the underlying cause stays attached as the error source. Shutdown
    /// is the exception: it propagates unwrapped so callers can terminate.
    pub fn read_ptr_chain(&mut self, pid: u32, base: u64, offsets: &[u64]) -> Result<u64> {
        let mut addr = base;
        for (hop, &offset) in offsets.iter().enumerate() {
            addr = self
                .read_ptr(pid, addr.wrapping_add(offset))
                .map_err(|e| {
                    if e.is_shutdown() {
                        e
                    } else {
                        Error::PointerChain {
                            hop,
                            base: addr,
                            offset,
                            source: Box::new(e),
                        }
                    }
                })?;
        }
        Ok(addr)
    }
}
