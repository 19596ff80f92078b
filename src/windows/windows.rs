use windows::Win32::Foundation::{CloseHandle, ERROR_INSUFFICIENT_BUFFER, NO_ERROR};
use windows::Win32::NetworkManagement::IpHelper::{
    GetExtendedTcpTable, MIB_TCP6TABLE_OWNER_PID, MIB_TCPTABLE_OWNER_PID,
    TCP_TABLE_OWNER_PID_LISTENER,
};
use windows::Win32::System::ProcessStatus::K32GetModuleBaseNameW;
use windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};

use std::ffi::OsString;
use std::io;
use std::os::windows::ffi::OsStringExt;

use crate::scanner::ListeningSocket;

const AF_INET: u32 = 2;
const AF_INET6: u32 = 23;

#[derive(Debug, Clone, Copy)]
enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    fn raw(self) -> u32 {
        match self {
            AddressFamily::Ipv4 => AF_INET,
            AddressFamily::Ipv6 => AF_INET6,
        }
    }
}

fn fetch_table(family: AddressFamily) -> io::Result<Vec<u8>> {
    let mut buffer_size = 0u32;

    unsafe {
        let result = GetExtendedTcpTable(
            None,
            &mut buffer_size,
            false,
            family.raw(),
            TCP_TABLE_OWNER_PID_LISTENER,
            0,
        );
        if result != ERROR_INSUFFICIENT_BUFFER.0 {
            return Err(io::Error::other(format!(
                "GetExtendedTcpTable size query failed for {:?}: {}",
                family, result
            )));
        }

        let mut buffer = vec![0u8; buffer_size as usize];
        let result = GetExtendedTcpTable(
            Some(buffer.as_mut_ptr() as *mut _),
            &mut buffer_size,
            false,
            family.raw(),
            TCP_TABLE_OWNER_PID_LISTENER,
            0,
        );
        if result == NO_ERROR.0 {
            Ok(buffer)
        } else {
            Err(io::Error::other(format!(
                "GetExtendedTcpTable failed for {:?}: {}",
                family, result
            )))
        }
    }
}

fn owner_pid(pid: u32) -> Option<u32> {
    (pid != 0).then_some(pid)
}

fn parse_tcp_ipv4(buffer: &[u8]) -> Vec<ListeningSocket> {
    let mut results = Vec::new();

    unsafe {
        let table = &*(buffer.as_ptr() as *const MIB_TCPTABLE_OWNER_PID);
        let rows = table.table.as_ptr();

        for i in 0..table.dwNumEntries {
            let row = &*rows.add(i as usize);
            results.push(ListeningSocket {
                port: u16::from_be(row.dwLocalPort as u16),
                pid: owner_pid(row.dwOwningPid),
            });
        }
    }

    results
}

fn parse_tcp_ipv6(buffer: &[u8]) -> Vec<ListeningSocket> {
    let mut results = Vec::new();

    unsafe {
        let table = &*(buffer.as_ptr() as *const MIB_TCP6TABLE_OWNER_PID);
        let rows = table.table.as_ptr();

        for i in 0..table.dwNumEntries {
            let row = &*rows.add(i as usize);
            results.push(ListeningSocket {
                port: u16::from_be(row.dwLocalPort as u16),
                pid: owner_pid(row.dwOwningPid),
            });
        }
    }

    results
}

pub fn listening_tcp_sockets() -> io::Result<Vec<ListeningSocket>> {
    let mut sockets = parse_tcp_ipv4(&fetch_table(AddressFamily::Ipv4)?);
    sockets.extend(parse_tcp_ipv6(&fetch_table(AddressFamily::Ipv6)?));
    Ok(sockets)
}

pub fn process_name(pid: u32) -> Option<String> {
    unsafe {
        let process_handle =
            OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid).ok()?;

        let mut name_buffer = vec![0u16; 256];
        let name_len = K32GetModuleBaseNameW(process_handle, None, &mut name_buffer);
        let _ = CloseHandle(process_handle);

        if name_len == 0 {
            return None;
        }

        Some(
            OsString::from_wide(&name_buffer[..name_len as usize])
                .to_string_lossy()
                .into_owned(),
        )
    }
}
