pub mod paging;

mod chain;
mod session;
mod transport;

#[cfg(target_os = "windows")]
mod win32;

#[cfg(test)]
pub mod mock;

pub use session::{DEFAULT_MAX_READ_PAGES, DeviceSession};
pub use transport::{DmaTransport, PageRead};

#[cfg(target_os = "windows")]
pub use win32::Win32Transport;

#[cfg(test)]
pub use mock::{MockLog, MockMemoryBuilder, MockTransport};
