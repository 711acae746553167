//! Hexdump command: display raw target memory.
//!
//! # Output Format
//!
//! ```text
//! 0x000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|
//! ```

use std::sync::Arc;

use anyhow::Result;
use dmalens_core::{Config, ShutdownSignal};

use crate::hex_utils::parse_hex_address;

pub fn run(
    config: &Config,
    address: &str,
    size: usize,
    ascii: bool,
    shutdown: &Arc<ShutdownSignal>,
) -> Result<()> {
    let address = parse_hex_address(address)?;
    let (mut session, pid) = super::open_target(config, shutdown)?;
    let bytes = session.read_buffer(pid, address, size)?;

    println!("Hexdump at 0x{address:X} ({size} bytes):");
    println!();

    for (i, chunk) in bytes.chunks(16).enumerate() {
        print!("0x{:03X}: ", i * 16);

        for (j, byte) in chunk.iter().enumerate() {
            if j == 8 {
                print!(" ");
            }
            print!("{byte:02X} ");
        }

        // Padding for incomplete lines
        for j in chunk.len()..16 {
            if j == 8 {
                print!(" ");
            }
            print!("   ");
        }

        if ascii {
            print!(" |");
            for byte in chunk {
                if *byte >= 0x20 && *byte < 0x7F {
                    print!("{}", *byte as char);
                } else {
                    print!(".");
                }
            }
            for _ in chunk.len()..16 {
                print!(" ");
            }
            print!("|");
        }

        println!();
    }

    Ok(())
}
