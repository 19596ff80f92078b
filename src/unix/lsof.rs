use crate::scanner::ListeningSocket;

use std::io;
use std::process::Command;

use tracing::debug;

pub fn listening_tcp_sockets() -> io::Result<Vec<ListeningSocket>> {
    let output = Command::new("lsof")
        .args(["-iTCP", "-sTCP:LISTEN", "-P", "-n"])
        .output()?;

    // lsof exits 1 when nothing matches
    if !output.status.success() && !output.stderr.is_empty() {
        return Err(io::Error::other(format!(
            "lsof command failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(parse_lsof_output(&String::from_utf8_lossy(&output.stdout)))
}

/// Columns: COMMAND PID USER FD TYPE DEVICE SIZE/OFF NODE NAME (STATE)
fn parse_lsof_output(output: &str) -> Vec<ListeningSocket> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 10 || !parts[9].contains("LISTEN") {
                return None;
            }

            let port = parts[8].rsplit(':').next()?.parse::<u16>().ok()?;
            let pid = parts[1].parse::<u32>().ok();

            Some(ListeningSocket { port, pid })
        })
        .collect()
}

pub fn process_name(pid: u32) -> Option<String> {
    let output = Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", "comm="])
        .output()
        .ok()?;

    if !output.status.success() {
        debug!(pid, "process name lookup failed");
        return None;
    }

    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let name = path.rsplit('/').next().unwrap_or_default().to_string();
    (!name.is_empty()).then_some(name)
}
