use serde::Serialize;

/// Transport of a reported port. Only TCP listeners are tracked.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
}

/// Owner of a listening socket as reported by the enumerator.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ListeningProcess {
    pub process: String,
    pub pid: Option<u32>,
}

/// One listening port joined with its resolved service label.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PortCard {
    pub port: u16,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub source: &'static str,
    pub protocol: Protocol,
    pub service_name: String,
    pub process: String,
    pub pid: Option<u32>,
}

impl PortCard {
    pub fn new(port: u16, service_name: String, owner: ListeningProcess) -> Self {
        Self {
            port,
            kind: "used",
            source: "system",
            protocol: Protocol::Tcp,
            service_name,
            process: owner.process,
            pid: owner.pid,
        }
    }

    /// Text matched by the dashboard search box.
    pub fn searchable_text(&self) -> String {
        let pid = self
            .pid
            .map_or_else(|| "none".to_string(), |pid| pid.to_string());
        format!(
            "{} {} {} {}",
            self.port, self.process, self.service_name, pid
        )
        .to_lowercase()
    }

    pub fn ref_array(&self) -> Vec<String> {
        vec![
            self.port.to_string(),
            "TCP".to_string(),
            self.service_name.clone(),
            self.process.clone(),
            self.pid.map(|pid| pid.to_string()).unwrap_or_default(),
        ]
    }
}

/// Result of one port analysis pass.
#[derive(Serialize, Debug, Clone, Default)]
pub struct PortAnalysis {
    pub port_cards: Vec<PortCard>,
    pub total_used: usize,
    pub tcp_used: usize,
    pub udp_used: usize,
}
