use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderValue, header},
    response::Response,
};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
    error::AppError,
    message::ChatRequest,
    services::relay,
    state::SharedState,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// `POST /api/chat`: validate, open the upstream completion, then stream its
/// text back as raw UTF-8 bytes.
pub async fn chat_handler(State(state): State<SharedState>, body: Bytes) -> Result<Response, AppError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("relay", %request_id);

    async move {
        let request = ChatRequest::parse(&body)?;
        let messages = relay::upstream_messages(&state.relay.system_prompt, request);

        let provider = state
            .providers
            .connect()
            .map_err(|e| AppError::ServiceInit(e.to_string()))?;

        info!(provider = provider.name(), turns = messages.len() - 1, "relaying chat request");
        let chunks = relay::open(provider.as_ref(), messages, state.relay.upstream_timeout).await?;

        let body = relay::relay_body(chunks, state.relay.idle_timeout);
        let mut response = Response::new(Body::from_stream(body));
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            headers.insert(REQUEST_ID_HEADER, value);
        }
        Ok(response)
    }
    .instrument(span)
    .await
}
