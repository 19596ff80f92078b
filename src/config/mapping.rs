use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Service name to port, as edited by the user.
pub type ServiceMapping = BTreeMap<String, u16>;

/// Written by `ConfigStore::init` when no config file exists yet.
pub const DEFAULT_SERVICES: [(&str, u16); 9] = [
    ("SSH", 22),
    ("HTTP", 80),
    ("HTTPS", 443),
    ("MySQL", 3306),
    ("PostgreSQL", 5432),
    ("Redis", 6379),
    ("MongoDB", 27017),
    ("Elasticsearch", 9200),
    ("NotePorts", 7577),
];

pub fn default_mapping() -> ServiceMapping {
    DEFAULT_SERVICES
        .iter()
        .map(|(name, port)| (name.to_string(), *port))
        .collect()
}

/// Value shapes accepted when reading a config file. Older files stored
/// ports as strings or as `{"port": n}` objects.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum StoredPort {
    Number(i64),
    Text(String),
    Entry { port: i64 },
}

impl StoredPort {
    fn port(&self) -> Option<i64> {
        match self {
            StoredPort::Number(port) | StoredPort::Entry { port } => Some(*port),
            StoredPort::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Narrows an integer to a usable port number.
pub fn valid_port(port: i64) -> Option<u16> {
    u16::try_from(port).ok().filter(|port| *port >= 1)
}

/// Normalizes a raw config document. Entries with an unsupported shape or
/// an out-of-range port are dropped.
pub fn normalize(raw: Map<String, Value>) -> ServiceMapping {
    raw.into_iter()
        .filter_map(|(name, value)| {
            let stored: StoredPort = serde_json::from_value(value).ok()?;
            let port = valid_port(stored.port()?)?;
            Some((name, port))
        })
        .collect()
}

/// Filters a batch update body: integers in range, or objects carrying an
/// integer `port` in range. Numeric strings are not accepted here.
pub fn batch_entries(body: &Map<String, Value>) -> ServiceMapping {
    body.iter()
        .filter_map(|(name, value)| {
            let port = match value {
                Value::Number(_) => value.as_i64(),
                Value::Object(entry) => entry.get("port").and_then(Value::as_i64),
                _ => None,
            }?;
            Some((name.clone(), valid_port(port)?))
        })
        .collect()
}
