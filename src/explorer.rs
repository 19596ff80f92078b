use crate::model::PortCard;

use chrono::{DateTime, Local};
use csv::Writer;
use std::io::{self, Write};
use std::str::FromStr;
use thiserror::Error;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    Csv,
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Error)]
#[error("unsupported export format: {0}")]
pub struct UnknownFormat(pub String);

impl FromStr for ExportFormat {
    type Err = UnknownFormat;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Yaml => "yaml",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Yaml => "application/yaml",
        }
    }
}

/// A rendered snapshot ready to be sent as a download.
#[derive(Debug)]
pub struct Snapshot {
    pub file_name: String,
    pub format: ExportFormat,
    pub body: Vec<u8>,
}

/// Renders port cards in the given format, named after `taken_at`.
pub fn export_snapshot(
    entries: &[PortCard],
    format: ExportFormat,
    taken_at: DateTime<Local>,
) -> io::Result<Snapshot> {
    let mut body = Vec::new();
    match format {
        ExportFormat::Csv => write_csv(&mut body, entries),
        ExportFormat::Json => write_json(&mut body, entries),
        ExportFormat::Yaml => write_yaml(&mut body, entries),
    }?;

    let file_name = format!(
        "ports-{}.{}",
        taken_at.format("%Y%m%d-%H%M%S"),
        format.extension()
    );

    Ok(Snapshot {
        file_name,
        format,
        body,
    })
}

fn write_csv(out: &mut impl Write, entries: &[PortCard]) -> io::Result<()> {
    let mut wtr = Writer::from_writer(out);
    wtr.write_record(["Port", "Protocol", "Service", "Process", "PID"])?;
    for card in entries {
        wtr.write_record(card.ref_array())?;
    }
    wtr.flush()
}

fn write_json(out: &mut impl Write, entries: &[PortCard]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(entries).map_err(io::Error::other)?;
    out.write_all(json.as_bytes())
}

fn write_yaml(out: &mut impl Write, entries: &[PortCard]) -> io::Result<()> {
    let yaml = serde_yaml::to_string(entries).map_err(io::Error::other)?;
    out.write_all(yaml.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ListeningProcess;
    use chrono::TimeZone;

    fn cards() -> Vec<PortCard> {
        vec![
            PortCard::new(
                22,
                "SSH".to_string(),
                ListeningProcess {
                    process: "sshd".to_string(),
                    pid: Some(1),
                },
            ),
            PortCard::new(
                8080,
                "HTTP Proxy".to_string(),
                ListeningProcess {
                    process: "Unknown".to_string(),
                    pid: None,
                },
            ),
        ]
    }

    fn taken_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("yml".parse::<ExportFormat>().unwrap(), ExportFormat::Yaml);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn csv_has_header_and_one_row_per_card() {
        let snapshot = export_snapshot(&cards(), ExportFormat::Csv, taken_at()).unwrap();
        let text = String::from_utf8(snapshot.body).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(snapshot.file_name, "ports-20250314-092653.csv");
        assert_eq!(lines[0], "Port,Protocol,Service,Process,PID");
        assert_eq!(lines[1], "22,TCP,SSH,sshd,1");
        assert_eq!(lines[2], "8080,TCP,HTTP Proxy,Unknown,");
    }

    #[test]
    fn json_matches_api_card_shape() {
        let snapshot = export_snapshot(&cards(), ExportFormat::Json, taken_at()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&snapshot.body).unwrap();

        assert_eq!(value[0]["protocol"], "TCP");
        assert_eq!(value[0]["type"], "used");
        assert_eq!(value[1]["pid"], serde_json::Value::Null);
    }

    #[test]
    fn yaml_lists_every_card() {
        let snapshot = export_snapshot(&cards(), ExportFormat::Yaml, taken_at()).unwrap();
        let text = String::from_utf8(snapshot.body).unwrap();

        assert!(text.contains("service_name: SSH"));
        assert!(text.contains("port: 8080"));
        assert!(snapshot.file_name.ends_with(".yaml"));
    }
}
