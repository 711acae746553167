use thiserror::Error;

use crate::scatter::TypeTag;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to initialize DMA device: {0}")]
    DeviceInit(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Module {module} not found in process {pid}")]
    ModuleNotFound { pid: u32, module: String },

    #[error("Device session is shutting down")]
    ShuttingDown,

    #[error("Read of {size} bytes exceeds the {max}-byte transfer bound")]
    OversizedRequest { size: usize, max: usize },

    #[error("Incomplete read at {address:#x}: expected {expected} bytes, got {actual}")]
    IncompleteRead {
        address: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Page transfer failed at {address:#x}")]
    PageFault { address: u64 },

    #[error("Buffer of {len} bytes cannot be decoded as {tag}")]
    DecodeMismatch { tag: TypeTag, len: usize },

    #[error("Pointer resolved to null")]
    NullPointer,

    #[error("Pointer chain failed at hop {hop} ({base:#x} + {offset:#x})")]
    PointerChain {
        hop: usize,
        base: u64,
        offset: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the shutdown fault. It always propagates to the caller's
    /// loop and is never retried.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Error::ShuttingDown)
    }

    /// Expected per-read conditions. The scatter executor records these as
    /// null results instead of propagating them.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Error::NullPointer
                | Error::DecodeMismatch { .. }
                | Error::PageFault { .. }
                | Error::IncompleteRead { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_is_not_expected() {
        assert!(Error::ShuttingDown.is_shutdown());
        assert!(!Error::ShuttingDown.is_expected());
    }

    #[test]
    fn test_per_read_failures_are_expected() {
        assert!(Error::NullPointer.is_expected());
        assert!(Error::PageFault { address: 0x1000 }.is_expected());
        assert!(
            Error::DecodeMismatch {
                tag: TypeTag::I32,
                len: 3
            }
            .is_expected()
        );
    }

    #[test]
    fn test_pointer_chain_preserves_source() {
        let err = Error::PointerChain {
            hop: 2,
            base: 0x4000,
            offset: 0x18,
            source: Box::new(Error::NullPointer),
        };
        assert!(err.to_string().contains("hop 2"));
        let source = std::error::Error::source(&err).expect("chain error carries its cause");
        assert!(source.to_string().contains("null"));
    }
}
