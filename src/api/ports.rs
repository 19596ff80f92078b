use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Local;
use serde::Deserialize;

use crate::analysis::PortRange;
use crate::api::error::ApiError;
use crate::api::{ApiResponse, AppState};
use crate::explorer::{ExportFormat, export_snapshot};
use crate::model::PortAnalysis;

#[derive(Debug, Default, Deserialize)]
pub struct PortsQuery {
    pub start_port: Option<String>,
    pub end_port: Option<String>,
    pub search: Option<String>,
}

impl PortsQuery {
    fn range(&self) -> PortRange {
        PortRange::from_query(self.start_port.as_deref(), self.end_port.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
    #[serde(flatten)]
    pub ports: PortsQuery,
}

async fn filtered_analysis(state: &AppState, query: &PortsQuery) -> Result<PortAnalysis, ApiError> {
    let mut analysis = state.analyze(query.range()).await?;
    if let Some(search) = query.search.as_deref() {
        analysis.retain_matching(search);
    }
    Ok(analysis)
}

pub async fn api_ports(
    State(state): State<AppState>,
    Query(query): Query<PortsQuery>,
) -> Result<Json<ApiResponse<PortAnalysis>>, ApiError> {
    let analysis = filtered_analysis(&state, &query).await?;
    Ok(Json(ApiResponse::data(analysis)))
}

pub async fn api_refresh(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PortAnalysis>>, ApiError> {
    let analysis = state.analyze(PortRange::default()).await?;
    Ok(Json(ApiResponse::data(analysis).with_message("Refreshed")))
}

pub async fn api_export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = match query.format.as_deref() {
        Some(raw) => raw
            .parse::<ExportFormat>()
            .map_err(|err| ApiError::bad_request(err.to_string()))?,
        None => ExportFormat::default(),
    };

    let analysis = filtered_analysis(&state, &query.ports).await?;
    let snapshot = export_snapshot(&analysis.port_cards, format, Local::now())?;

    let headers = [
        (header::CONTENT_TYPE, snapshot.format.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", snapshot.file_name),
        ),
    ];
    Ok((headers, snapshot.body).into_response())
}
