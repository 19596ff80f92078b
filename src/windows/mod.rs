#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "windows")]
pub use crate::windows::windows::{listening_tcp_sockets, process_name};
