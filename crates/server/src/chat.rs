use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use slotbot_agent::ChatRuntime;
use slotbot_core::errors::InterfaceError;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<ChatRuntime>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MessageRequest {
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub response: String,
    pub session_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ChatError(InterfaceError);

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            InterfaceError::BadRequest { message, .. } => (StatusCode::BAD_REQUEST, message.clone()),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, self.0.user_message().to_string())
            }
            InterfaceError::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.user_message().to_string())
            }
        };
        let body = ErrorBody { error, correlation_id: self.0.correlation_id().to_string() };
        (status, Json(body)).into_response()
    }
}

pub fn router(runtime: Arc<ChatRuntime>) -> Router {
    Router::new().route("/message", post(post_message)).with_state(ChatState { runtime })
}

pub async fn post_message(
    State(state): State<ChatState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ChatError> {
    let correlation_id = Uuid::new_v4().to_string();

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(
                event_name = "http.message.rejected",
                correlation_id = %correlation_id,
                error = %rejection.body_text(),
                "message request body could not be decoded"
            );
            return Err(ChatError(InterfaceError::bad_request(
                format!("invalid request body: {}", rejection.body_text()),
                correlation_id,
            )));
        }
    };

    let Some(message) = request.message else {
        warn!(
            event_name = "http.message.rejected",
            correlation_id = %correlation_id,
            "message request is missing the `message` field"
        );
        return Err(ChatError(InterfaceError::bad_request(
            "missing `message` field",
            correlation_id,
        )));
    };

    match state.runtime.handle_message(request.session_id.as_deref(), &message) {
        Ok(reply) => {
            info!(
                event_name = "http.message.handled",
                correlation_id = %correlation_id,
                session_id = %reply.session_id,
                intent = reply.event.intent(),
                "message handled"
            );
            Ok(Json(MessageResponse { response: reply.response, session_id: reply.session_id }))
        }
        Err(application_error) => {
            error!(
                event_name = "http.message.failed",
                correlation_id = %correlation_id,
                error = %application_error,
                "message handling failed"
            );
            Err(ChatError(application_error.into_interface(correlation_id)))
        }
    }
}
