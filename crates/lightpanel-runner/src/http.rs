//! HTTP front-end.
//!
//! Every route forwards one operation to the panel actor and answers once
//! the command has been written to the panel. Acknowledgements arrive
//! asynchronously; poll `GET /state` to observe them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use lightpanel_protocol::PanelError;
use serde::Deserialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::actor::{PanelHandle, PanelOp, PanelSnapshot};
use crate::error::RequestError;

/// Body returned for paths the controller does not serve.
pub const UNRECOGNISED: &str = "Unrecognised API call";

/// Build the router for a running panel actor.
pub fn router(panel: PanelHandle) -> Router {
    Router::new()
        .route("/connect", get(connect))
        .route("/disconnect", get(disconnect))
        .route("/state", get(state))
        .route("/tempo/:bpm", post(set_tempo))
        .route("/led/:row/:col", post(set_led))
        .route("/led/:row/:col/color/:color", post(set_led_color))
        .route("/led/:row/:col/:onoff", post(set_led_on_off))
        .route("/line/:line/reset", post(reset_line))
        .route("/line/:line/stop/:stop", post(stop_line))
        .route("/panel/off", post(panel_off))
        .fallback(|| async {
            warn!("unmatched request");
            (StatusCode::NOT_FOUND, UNRECOGNISED)
        })
        .with_state(panel)
        .layer(TraceLayer::new_for_http())
}

/// JSON body of `POST /led/:row/:col`.
#[derive(Debug, Deserialize)]
pub struct LedRequest {
    pub color: String,
    /// `true`/`false` or an on/off token.
    #[serde(default)]
    pub on: Option<Value>,
}

impl LedRequest {
    fn on_token(&self) -> String {
        match &self.on {
            Some(Value::Bool(on)) => on.to_string(),
            Some(Value::String(token)) => token.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "false".to_string(),
        }
    }
}

/// Error response for a failed request.
#[derive(Debug)]
pub struct ApiError(RequestError);

impl From<RequestError> for ApiError {
    fn from(error: RequestError) -> Self {
        ApiError(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            RequestError::Panel(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            RequestError::Panel(PanelError::NotConnected)
            | RequestError::Panel(PanelError::NotDisconnected)
            | RequestError::Panel(PanelError::AwaitingAcknowledgement { .. }) => StatusCode::CONFLICT,
            RequestError::Panel(_) => StatusCode::BAD_REQUEST,
            RequestError::Link(_) => StatusCode::BAD_GATEWAY,
            RequestError::ActorGone => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, self.0.to_string()).into_response()
    }
}

type ApiResult = Result<StatusCode, ApiError>;

async fn run(panel: &PanelHandle, op: PanelOp) -> ApiResult {
    panel.operate(op).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn connect(State(panel): State<PanelHandle>) -> ApiResult {
    run(&panel, PanelOp::Connect).await
}

async fn disconnect(State(panel): State<PanelHandle>) -> ApiResult {
    run(&panel, PanelOp::Disconnect).await
}

async fn state(State(panel): State<PanelHandle>) -> Result<Json<PanelSnapshot>, ApiError> {
    Ok(Json(panel.snapshot().await?))
}

async fn set_tempo(State(panel): State<PanelHandle>, Path(bpm): Path<i64>) -> ApiResult {
    run(&panel, PanelOp::SetTempo { bpm }).await
}

async fn set_led(
    State(panel): State<PanelHandle>,
    Path((row, column)): Path<(i64, i64)>,
    Json(body): Json<LedRequest>,
) -> ApiResult {
    let on = body.on_token();
    run(
        &panel,
        PanelOp::SetLed {
            row,
            column,
            color: body.color,
            on,
        },
    )
    .await
}

async fn set_led_color(
    State(panel): State<PanelHandle>,
    Path((row, column, color)): Path<(i64, i64, String)>,
) -> ApiResult {
    run(&panel, PanelOp::SetLedColor { row, column, color }).await
}

async fn set_led_on_off(
    State(panel): State<PanelHandle>,
    Path((row, column, on)): Path<(i64, i64, String)>,
) -> ApiResult {
    run(&panel, PanelOp::SetLedOnOff { row, column, on }).await
}

async fn reset_line(State(panel): State<PanelHandle>, Path(line): Path<i64>) -> ApiResult {
    run(&panel, PanelOp::ResetLine { line }).await
}

async fn stop_line(
    State(panel): State<PanelHandle>,
    Path((line, stop)): Path<(i64, String)>,
) -> ApiResult {
    run(&panel, PanelOp::StopLine { line, stop }).await
}

async fn panel_off(State(panel): State<PanelHandle>) -> ApiResult {
    run(&panel, PanelOp::PanelOff).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;

    #[test]
    fn test_status_mapping() {
        let status = |e: RequestError| ApiError::from(e).status();

        assert_eq!(status(PanelError::InvalidRow(3).into()), StatusCode::BAD_REQUEST);
        assert_eq!(status(PanelError::InvalidColor("mauve-ish".into()).into()), StatusCode::BAD_REQUEST);
        assert_eq!(status(PanelError::NotDisconnected.into()), StatusCode::CONFLICT);
        assert_eq!(
            status(PanelError::AwaitingAcknowledgement { expected: "DONE".into() }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(status(LinkError::NoTarget.into()), StatusCode::BAD_GATEWAY);
        assert_eq!(status(RequestError::ActorGone), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_led_request_on_token() {
        let parse = |json: &str| serde_json::from_str::<LedRequest>(json).unwrap().on_token();

        assert_eq!(parse(r#"{"color":"red","on":true}"#), "true");
        assert_eq!(parse(r#"{"color":"red","on":"off"}"#), "off");
        assert_eq!(parse(r#"{"color":"red","on":1}"#), "1");
        assert_eq!(parse(r#"{"color":"red"}"#), "false");
    }
}
