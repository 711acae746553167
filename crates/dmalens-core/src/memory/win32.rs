//! Usermode Windows transport.
//!
//! Software fallback behind the same contract a hardware DMA device
//! implements: each page of a scatter transfer reports success
//! independently, so one faulted page never poisons the rest of a round.

use std::ffi::c_void;

use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW, PROCESSENTRY32W,
    Process32FirstW, Process32NextW, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};

use crate::error::{Error, Result};
use crate::memory::paging::PAGE_SIZE;
use crate::memory::transport::{DmaTransport, PageRead};

/// Reads a target process with `ReadProcessMemory`, caching the process
/// handle across calls for the lifetime of the session.
pub struct Win32Transport {
    handle: Option<HANDLE>,
    handle_pid: u32,
}

impl Win32Transport {
    pub fn open() -> Result<Self> {
        Ok(Self {
            handle: None,
            handle_pid: 0,
        })
    }

    fn process_handle(&mut self, pid: u32) -> Result<HANDLE> {
        if let Some(handle) = self.handle {
            if self.handle_pid == pid {
                return Ok(handle);
            }
            // SAFETY: handle was returned by OpenProcess and not closed since.
            unsafe {
                let _ = CloseHandle(handle);
            }
            self.handle = None;
        }

        // SAFETY: no handle inheritance, read-only access rights.
        let handle = unsafe { OpenProcess(PROCESS_VM_READ | PROCESS_QUERY_INFORMATION, false, pid) }
            .map_err(|e| Error::DeviceInit(format!("OpenProcess({pid}) failed: {e}")))?;
        self.handle = Some(handle);
        self.handle_pid = pid;
        Ok(handle)
    }

    /// Best-effort read; returns the number of bytes copied into `buf`.
    fn read_raw(&mut self, pid: u32, addr: u64, buf: &mut [u8]) -> Result<usize> {
        let handle = self.process_handle(pid)?;
        let mut copied = 0usize;
        // A failed call still reports the bytes copied before the fault,
        // which is all the caller needs to judge the read.
        // SAFETY: buf is valid for writes of buf.len() bytes and copied
        // receives the transferred byte count.
        let _ = unsafe {
            ReadProcessMemory(
                handle,
                addr as *const c_void,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                Some(&mut copied),
            )
        };
        Ok(copied)
    }
}

impl DmaTransport for Win32Transport {
    fn pid_by_name(&mut self, name: &str) -> Result<u32> {
        // SAFETY: snapshot handle is closed below on every path.
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map_err(|e| Error::DeviceInit(format!("process snapshot failed: {e}")))?;

        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let mut found = None;
        // SAFETY: entry.dwSize is initialized to the struct size.
        if unsafe { Process32FirstW(snapshot, &mut entry) }.is_ok() {
            loop {
                if wide_eq_ignore_case(&entry.szExeFile, name) {
                    found = Some(entry.th32ProcessID);
                    break;
                }
                // SAFETY: same snapshot and entry as the first call.
                if unsafe { Process32NextW(snapshot, &mut entry) }.is_err() {
                    break;
                }
            }
        }

        // SAFETY: snapshot is a live handle from CreateToolhelp32Snapshot.
        unsafe {
            let _ = CloseHandle(snapshot);
        }

        found.ok_or_else(|| Error::ProcessNotFound(name.to_string()))
    }

    fn module_base(&mut self, pid: u32, module: &str) -> Result<u64> {
        // SAFETY: snapshot handle is closed below on every path.
        let snapshot =
            unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid) }
                .map_err(|e| Error::DeviceInit(format!("module snapshot failed: {e}")))?;

        let mut entry = MODULEENTRY32W {
            dwSize: size_of::<MODULEENTRY32W>() as u32,
            ..Default::default()
        };

        let mut found = None;
        // SAFETY: entry.dwSize is initialized to the struct size.
        if unsafe { Module32FirstW(snapshot, &mut entry) }.is_ok() {
            loop {
                if wide_eq_ignore_case(&entry.szModule, module) {
                    found = Some(entry.modBaseAddr as u64);
                    break;
                }
                // SAFETY: same snapshot and entry as the first call.
                if unsafe { Module32NextW(snapshot, &mut entry) }.is_err() {
                    break;
                }
            }
        }

        // SAFETY: snapshot is a live handle from CreateToolhelp32Snapshot.
        unsafe {
            let _ = CloseHandle(snapshot);
        }

        found.ok_or_else(|| Error::ModuleNotFound {
            pid,
            module: module.to_string(),
        })
    }

    fn scatter_read(&mut self, pid: u32, pages: &[u64]) -> Result<Vec<PageRead>> {
        let mut results = Vec::with_capacity(pages.len());
        for &page in pages {
            let mut buf = vec![0u8; PAGE_SIZE as usize];
            let copied = self.read_raw(pid, page, &mut buf)?;
            if copied == PAGE_SIZE as usize {
                results.push(PageRead::succeeded(page, buf));
            } else {
                results.push(PageRead::failed(page));
            }
        }
        Ok(results)
    }

    fn read(&mut self, pid: u32, addr: u64, buf: &mut [u8]) -> Result<usize> {
        self.read_raw(pid, addr, buf)
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            // SAFETY: handle was returned by OpenProcess and not closed since.
            unsafe {
                let _ = CloseHandle(handle);
            }
        }
    }
}

/// Compare a NUL-terminated UTF-16 name buffer against `name`, ignoring
/// ASCII case.
fn wide_eq_ignore_case(buf: &[u16], name: &str) -> bool {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    let decoded = String::from_utf16_lossy(&buf[..len]);
    decoded.eq_ignore_ascii_case(name)
}
