use axum::{Json, body::Bytes, extract::State};
use serde_json::{Map, Value};

use crate::api::error::ApiError;
use crate::api::{AppState, MessageResponse};
use crate::config::{ServiceMapping, batch_entries, valid_port};

pub async fn api_get_config(State(state): State<AppState>) -> Json<ServiceMapping> {
    Json(state.store.current())
}

/// Accepts either a whole mapping (batch) or a single
/// `{port, service_name}` entry.
pub async fn api_save_config(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let data: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid data"))?;
    if is_empty_value(&data) {
        return Err(ApiError::bad_request("Invalid data"));
    }

    let update = match data {
        Value::Object(map) if map.contains_key("port") && map.contains_key("service_name") => {
            ConfigUpdate::single(&map)?
        }
        Value::Object(map) => ConfigUpdate::Batch(batch_entries(&map)),
        _ => {
            return Err(ApiError::bad_request(
                "Batch update not supported in this version",
            ));
        }
    };

    let store = state.store.clone();
    tokio::task::spawn_blocking(move || match update {
        ConfigUpdate::Batch(mapping) => store.replace_all(&mapping),
        ConfigUpdate::Single { service_name, port } => store.assign(&service_name, port),
    })
    .await??;

    Ok(Json(MessageResponse::ok("Config saved")))
}

enum ConfigUpdate {
    Batch(ServiceMapping),
    Single { service_name: String, port: u16 },
}

impl ConfigUpdate {
    fn single(entry: &Map<String, Value>) -> Result<Self, ApiError> {
        let service_name = entry
            .get("service_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::bad_request("Service name cannot be empty"))?;

        let port = entry
            .get("port")
            .filter(|port| port.is_number())
            .and_then(Value::as_i64)
            .and_then(valid_port)
            .ok_or_else(|| ApiError::bad_request("Invalid port number"))?;

        Ok(ConfigUpdate::Single {
            service_name: service_name.to_string(),
            port,
        })
    }
}

/// Bodies carrying nothing to apply.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
