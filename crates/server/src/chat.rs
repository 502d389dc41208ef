//! The chat endpoint: admission check first, then one service turn.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tracing::warn;

use subchat_agent::{ChatRequest, ChatService};
use subchat_core::admission::{AdmissionDecision, AdmissionGate};

#[derive(Clone)]
pub struct ChatState {
    pub gate: Arc<AdmissionGate>,
    pub chat: Arc<ChatService>,
}

pub fn router(state: ChatState) -> Router {
    Router::new().route("/api/v1/chat", post(chat)).with_state(state)
}

/// Admission is keyed by customer id. A denied request never reaches
/// intent resolution; the reply carries `Retry-After` in both the
/// header and the body.
pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    let identity = request.customer_id.0.to_string();

    match state.gate.check_and_record(&identity) {
        AdmissionDecision::Denied { retry_after } => {
            let retry_after_secs = retry_after.as_secs().max(1);
            warn!(
                event_name = "chat.rate_limited",
                customer_id = %identity,
                retry_after_secs,
                "request denied by admission gate"
            );

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "rate_limited",
                    "retry_after_secs": retry_after_secs,
                })),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
        AdmissionDecision::Allowed { .. } => {
            let reply = state.chat.handle(&request).await;
            (StatusCode::OK, Json(reply)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::State;
    use axum::http::{header, StatusCode};
    use axum::Json;
    use uuid::Uuid;

    use subchat_agent::{ChatRequest, ChatService};
    use subchat_core::admission::AdmissionGate;
    use subchat_core::domain::customer::CustomerId;
    use subchat_db::repositories::{
        InMemoryBillingRepository, InMemoryCustomerRepository, InMemoryPlanRepository,
        InMemorySubscriptionRepository,
    };

    use super::{chat, ChatState};

    fn state(max_requests: u32) -> ChatState {
        let chat = ChatService::new(
            Arc::new(InMemoryCustomerRepository::default()),
            Arc::new(InMemoryPlanRepository::default()),
            Arc::new(InMemorySubscriptionRepository::default()),
            Arc::new(InMemoryBillingRepository::default()),
            None,
        );
        ChatState {
            gate: Arc::new(AdmissionGate::new(max_requests, Duration::from_secs(60))),
            chat: Arc::new(chat),
        }
    }

    fn request(customer_id: &CustomerId) -> ChatRequest {
        ChatRequest {
            customer_id: customer_id.clone(),
            message: "show me my subscriptions".to_string(),
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn admitted_request_reaches_the_service() {
        let state = state(10);
        let customer_id = CustomerId(Uuid::new_v4());

        let response = chat(State(state), Json(request(&customer_id))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn request_over_quota_is_denied_with_retry_after() {
        let state = state(2);
        let customer_id = CustomerId(Uuid::new_v4());

        for _ in 0..2 {
            let response = chat(State(state.clone()), Json(request(&customer_id))).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let denied = chat(State(state), Json(request(&customer_id))).await;
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after = denied
            .headers()
            .get(header::RETRY_AFTER)
            .expect("denied replies carry Retry-After");
        let seconds: u64 =
            retry_after.to_str().expect("ascii header").parse().expect("numeric header");
        assert!(seconds >= 1 && seconds <= 60);
    }

    #[tokio::test]
    async fn quota_is_tracked_per_customer() {
        let state = state(1);
        let first = CustomerId(Uuid::new_v4());
        let second = CustomerId(Uuid::new_v4());

        let response = chat(State(state.clone()), Json(request(&first))).await;
        assert_eq!(response.status(), StatusCode::OK);

        // First customer is now out of quota; the second is untouched.
        let denied = chat(State(state.clone()), Json(request(&first))).await;
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = chat(State(state), Json(request(&second))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
