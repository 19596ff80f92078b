#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
pub use linux::{listening_tcp_sockets, process_name};

#[cfg(not(target_os = "linux"))]
mod lsof;

#[cfg(not(target_os = "linux"))]
pub use lsof::{listening_tcp_sockets, process_name};
