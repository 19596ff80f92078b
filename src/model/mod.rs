pub mod common;
pub use common::{ListeningProcess, PortAnalysis, PortCard};
