//! HTTP control surface for the streaming generator.
//!
//! Routes:
//! - `GET /generator?type=&frequency=&impact=&extension=&changeDuration=`
//! - `GET /generator?type=<dataset>&frequency=[&fade=a,b&window=&slide=]`
//! - `GET /stop`
//! - `GET /status`

use crate::controller::{ControlError, ControllerStatus, GeneratorController, SYNTHETIC_KEY};
use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sim_generator::ColumnFade;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// JSON body of `/generator` and `/stop` replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub message: String,
}

impl Response {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK.as_u16(),
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST.as_u16(),
            message: message.into(),
        }
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> HttpResponse {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Raw query of `/generator`; numbers are parsed by the handler so that a
/// malformed value reads as missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorParams {
    #[serde(rename = "type")]
    pub dataset_type: Option<String>,
    pub frequency: Option<String>,
    pub impact: Option<String>,
    pub extension: Option<String>,
    pub change_duration: Option<String>,
    /// Comma-separated columns of a real dataset to fade out
    pub fade: Option<String>,
    pub window: Option<String>,
    pub slide: Option<String>,
}

fn parse<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

/// Fade settings of a real-dataset request; `None` without `fade`.
fn column_fade(params: &GeneratorParams) -> Result<Option<ColumnFade>, Response> {
    let columns: Vec<String> = params
        .fade
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty())
        .map(String::from)
        .collect();
    if columns.is_empty() {
        return Ok(None);
    }

    let (Some(window), Some(slide)) = (parse(&params.window), parse(&params.slide)) else {
        return Err(Response::bad_request(
            "Missing required parameters for fading: window and slide.",
        ));
    };
    ColumnFade::new(columns, window, slide)
        .map(Some)
        .map_err(|e| Response::bad_request(e.to_string()))
}

/// Build the control router over `controller`.
pub fn router(controller: Arc<GeneratorController>) -> Router {
    Router::new()
        .route("/generator", get(start_generator))
        .route("/stop", get(stop_generator))
        .route("/status", get(generator_status))
        .with_state(controller)
}

async fn start_generator(
    State(controller): State<Arc<GeneratorController>>,
    Query(params): Query<GeneratorParams>,
) -> Response {
    let dataset_type = params.dataset_type.as_deref().map(str::trim).unwrap_or("");
    let frequency: Option<u64> = parse(&params.frequency);
    let Some(frequency) = frequency.filter(|_| !dataset_type.is_empty()) else {
        return Response::bad_request("Missing required parameters: type, frequency.");
    };

    if dataset_type.eq_ignore_ascii_case(SYNTHETIC_KEY) {
        let impact: Option<f64> = parse(&params.impact);
        let extension: Option<f64> = parse(&params.extension);
        let change_duration: Option<u64> = parse(&params.change_duration);
        let (Some(impact), Some(extension), Some(change_duration)) =
            (impact, extension, change_duration)
        else {
            return Response::bad_request(
                "Missing required parameters for synthetic dataset: impact, extension and changeDuration.",
            );
        };
        if !(0.0..=1.0).contains(&impact) || !(0.0..=1.0).contains(&extension) {
            return Response::bad_request("Impact and extension must be in the range 0-1.");
        }

        match controller
            .start_synthetic(impact, extension, change_duration, frequency)
            .await
        {
            Ok(_) => Response::ok(format!(
                "Generating synthetic dataset with frequency {frequency}, impact {impact}, and extension {extension}."
            )),
            Err(e) => rejected(e),
        }
    } else {
        if !controller.has_dataset(dataset_type) {
            return Response::bad_request("Invalid type parameter.");
        }
        let fade = match column_fade(&params) {
            Ok(fade) => fade,
            Err(response) => return response,
        };

        match fade {
            Some(fade) => {
                let columns = fade.columns().join(", ");
                match controller
                    .start_real_fading(dataset_type, frequency, fade)
                    .await
                {
                    Ok(key) => Response::ok(format!(
                        "Generating {key} dataset with frequency {frequency}, fading {columns}."
                    )),
                    Err(e) => rejected(e),
                }
            }
            None => match controller.start_real(dataset_type, frequency).await {
                Ok(key) => Response::ok(format!(
                    "Generating {key} dataset with frequency {frequency}."
                )),
                Err(e) => rejected(e),
            },
        }
    }
}

fn rejected(error: ControlError) -> Response {
    warn!("Generator start rejected: {}", error);
    Response::bad_request(error.to_string())
}

async fn stop_generator(State(controller): State<Arc<GeneratorController>>) -> Response {
    match controller.stop().await {
        Ok(_) => Response::ok("Generation stopped."),
        Err(e) => Response::bad_request(e.to_string()),
    }
}

async fn generator_status(
    State(controller): State<Arc<GeneratorController>>,
) -> Json<ControllerStatus> {
    Json(controller.status().await)
}

/// Serve the control routes on `listen` until Ctrl+C, then stop any active run.
pub async fn serve(listen: &str, controller: Arc<GeneratorController>) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind to {listen}"))?;
    info!("Control server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(controller.clone()))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Received shutdown signal");
        })
        .await
        .context("Control server failed")?;

    match controller.stop().await {
        Ok(_) | Err(ControlError::NotRunning) => Ok(()),
        Err(e) => Err(e).context("Failed to stop the active run"),
    }
}
