use std::collections::HashMap;

use crate::config::ServiceMapping;

pub const UNKNOWN_SERVICE: &str = "Unknown Service";

/// Built-in labels for common ports, used when the user has not named one.
pub fn well_known_service(port: u16) -> Option<&'static str> {
    let name = match port {
        21 => "FTP",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        80 => "HTTP",
        110 => "POP3",
        135 => "RPC",
        139 => "NetBIOS Session",
        143 => "IMAP",
        443 => "HTTPS",
        445 => "SMB",
        1433 => "SQL Server",
        1521 => "Oracle",
        3306 => "MySQL",
        3389 => "RDP",
        5432 => "PostgreSQL",
        5900 => "VNC",
        6379 => "Redis",
        8080 => "HTTP Proxy",
        8443 => "HTTPS Alt",
        9200 => "Elasticsearch",
        27017 => "MongoDB",
        _ => return None,
    };
    Some(name)
}

/// Port to label lookup: user mapping first, then the well-known table.
#[derive(Debug, Default)]
pub struct ServiceResolver<'a> {
    overrides: HashMap<u16, &'a str>,
}

impl<'a> ServiceResolver<'a> {
    /// Inverts the name to port mapping. When several names share a port,
    /// the one iterated last (highest in name order) is kept.
    pub fn new(mapping: &'a ServiceMapping) -> Self {
        let overrides = mapping
            .iter()
            .map(|(name, port)| (*port, name.as_str()))
            .collect();
        Self { overrides }
    }

    pub fn resolve(&self, port: u16) -> &'a str {
        self.overrides
            .get(&port)
            .copied()
            .or_else(|| well_known_service(port))
            .unwrap_or(UNKNOWN_SERVICE)
    }
}
