use std::collections::BTreeMap;
use std::io;

use tracing::{debug, warn};

use crate::model::ListeningProcess;

#[cfg(target_family = "unix")]
use crate::unix;

#[cfg(target_family = "windows")]
use crate::windows;

pub const UNKNOWN_PROCESS: &str = "Unknown";

/// A TCP socket in the LISTEN state, as read from the OS connection table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListeningSocket {
    pub port: u16,
    pub pid: Option<u32>,
}

/// Access to the host's connection table and process names.
pub trait PortSource: Send + Sync {
    /// Every TCP socket currently listening, duplicates included.
    fn listening_tcp_sockets(&self) -> io::Result<Vec<ListeningSocket>>;

    /// Name of a running process, if it can be read.
    fn process_name(&self, pid: u32) -> Option<String>;
}

/// `PortSource` backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortSource;

impl PortSource for SystemPortSource {
    fn listening_tcp_sockets(&self) -> io::Result<Vec<ListeningSocket>> {
        #[cfg(target_family = "unix")]
        {
            unix::listening_tcp_sockets()
        }
        #[cfg(target_family = "windows")]
        {
            windows::listening_tcp_sockets()
        }
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        #[cfg(target_family = "unix")]
        {
            unix::process_name(pid)
        }
        #[cfg(target_family = "windows")]
        {
            windows::process_name(pid)
        }
    }
}

/// Listening ports keyed by port number. The first socket seen on a port
/// wins; a failed table query yields no ports.
pub fn list_listening_ports(source: &dyn PortSource) -> BTreeMap<u16, ListeningProcess> {
    let sockets = match source.listening_tcp_sockets() {
        Ok(sockets) => sockets,
        Err(err) => {
            warn!(error = %err, "failed to read host ports");
            return BTreeMap::new();
        }
    };

    let mut ports = BTreeMap::new();
    for socket in sockets {
        ports.entry(socket.port).or_insert_with(|| {
            let process = socket
                .pid
                .and_then(|pid| source.process_name(pid))
                .unwrap_or_else(|| UNKNOWN_PROCESS.to_string());
            ListeningProcess {
                process,
                pid: socket.pid,
            }
        });
    }
    debug!(count = ports.len(), "listening ports enumerated");
    ports
}
