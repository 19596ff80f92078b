use crate::scanner::ListeningSocket;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

const TCP_TABLES: [&str; 2] = ["/proc/net/tcp", "/proc/net/tcp6"];
const TCP_STATE_LISTEN: &str = "0A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableEntry {
    port: u16,
    inode: u64,
}

pub fn listening_tcp_sockets() -> io::Result<Vec<ListeningSocket>> {
    let mut entries = Vec::new();
    for (index, table) in TCP_TABLES.iter().enumerate() {
        match fs::read_to_string(table) {
            Ok(contents) => entries.extend(parse_tcp_table(&contents)),
            // tcp6 is missing on hosts without IPv6
            Err(err) if index > 0 && err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
    }

    let owners = socket_owners(entries.iter().map(|entry| entry.inode).collect());

    Ok(entries
        .into_iter()
        .map(|entry| ListeningSocket {
            port: entry.port,
            pid: owners.get(&entry.inode).copied(),
        })
        .collect())
}

fn parse_tcp_table(contents: &str) -> Vec<TableEntry> {
    contents.lines().skip(1).filter_map(parse_tcp_line).collect()
}

/// Columns: sl local_address rem_address st tx:rx tr:when retrnsmt uid timeout inode
fn parse_tcp_line(line: &str) -> Option<TableEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 || fields[3] != TCP_STATE_LISTEN {
        return None;
    }

    let port_hex = fields[1].rsplit(':').next()?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    let inode = fields[9].parse().ok()?;

    Some(TableEntry { port, inode })
}

/// Maps socket inodes to the pid holding them by walking `/proc/<pid>/fd`.
/// Processes whose descriptors cannot be read are skipped.
fn socket_owners(inodes: HashSet<u64>) -> HashMap<u64, u32> {
    let mut owners = HashMap::new();
    if inodes.is_empty() {
        return owners;
    }

    let Ok(proc_dir) = fs::read_dir("/proc") else {
        return owners;
    };

    for entry in proc_dir.flatten() {
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };

        let Ok(fds) = fs::read_dir(entry.path().join("fd")) else {
            continue;
        };

        for fd in fds.flatten() {
            let inode = fs::read_link(fd.path())
                .ok()
                .and_then(|target| socket_inode(&target));
            if let Some(inode) = inode.filter(|inode| inodes.contains(inode)) {
                owners.entry(inode).or_insert(pid);
            }
        }

        if owners.len() == inodes.len() {
            break;
        }
    }

    owners
}

fn socket_inode(target: &Path) -> Option<u64> {
    target
        .to_str()?
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

pub fn process_name(pid: u32) -> Option<String> {
    let comm = PathBuf::from(format!("/proc/{}/comm", pid));
    match fs::read_to_string(&comm) {
        Ok(name) => Some(name.trim().to_string()),
        Err(err) => {
            debug!(pid, error = %err, "process name lookup failed");
            None
        }
    }
}
