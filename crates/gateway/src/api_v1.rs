//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/chat`            Stream a reply grounded in the knowledge base
//! - `POST   /v1/knowledge`       Add content; processing continues in the background
//! - `GET    /v1/knowledge`       List items, newest first
//! - `GET    /v1/knowledge/{id}`  Get one item
//! - `DELETE /v1/knowledge/{id}`  Delete one item

use axum::{
    Router,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use secondbrain_chat::ChatError;
use secondbrain_core::knowledge::KnowledgeItem;
use secondbrain_core::message::ConversationTurn;
use secondbrain_knowledge::{IngestError, IngestRequest};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::SharedState;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/knowledge", post(ingest_handler).get(list_knowledge_handler))
        .route(
            "/knowledge/{id}",
            get(get_knowledge_handler).delete(delete_knowledge_handler),
        )
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeListResponse {
    pub items: Vec<KnowledgeItem>,
    pub count: usize,
}

fn error_response(status: StatusCode, error: impl Into<String>, code: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
        .into_response()
}

fn bad_request(rejection: JsonRejection) -> Response {
    warn!(error = %rejection.body_text(), "Rejected malformed request body");
    error_response(StatusCode::BAD_REQUEST, rejection.body_text(), "invalid_request")
}

/// Chat failures rendered as `{error, code}` with the matching status.
struct ChatErrorResponse(ChatError);

impl IntoResponse for ChatErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error_response(status, self.0.to_string(), self.0.code())
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection),
    };

    info!(turns = request.messages.len(), "v1/chat request");

    match state.pipeline.run(request.messages).await {
        // The body owns the upstream stream; a client disconnect drops both.
        Ok(stream) => (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(stream),
        )
            .into_response(),
        Err(e) => {
            if let ChatError::Upstream(detail) = &e {
                error!(detail = %detail, "Chat relay failed");
            }
            ChatErrorResponse(e).into_response()
        }
    }
}

async fn ingest_handler(
    State(state): State<SharedState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection),
    };

    match state.ingestor.submit(request).await {
        Ok(submitted) => (StatusCode::ACCEPTED, Json(submitted.item)).into_response(),
        Err(IngestError::Invalid(message)) => {
            error_response(StatusCode::BAD_REQUEST, message, "invalid_request")
        }
        Err(e) => {
            error!(error = %e, "Failed to record knowledge item");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), "store_error")
        }
    }
}

async fn list_knowledge_handler(State(state): State<SharedState>) -> Response {
    match state.store.list().await {
        Ok(items) => Json(KnowledgeListResponse {
            count: items.len(),
            items,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), "store_error"),
    }
}

async fn get_knowledge_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.get(&id).await {
        Ok(Some(item)) => Json(item).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("Knowledge item '{id}' not found"),
            "not_found",
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), "store_error"),
    }
}

async fn delete_knowledge_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.delete(&id).await {
        Ok(true) => {
            info!(id = %id, "Knowledge item deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            format!("Knowledge item '{id}' not found"),
            "not_found",
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), "store_error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppState;
    use axum::http::Request;
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use secondbrain_chat::{ChatPipeline, ContextRetriever};
    use secondbrain_config::RetrievalConfig;
    use secondbrain_core::error::ProviderError;
    use secondbrain_core::knowledge::{ItemStatus, KnowledgeStore, NewKnowledgeItem};
    use secondbrain_core::provider::{ByteStream, Provider, ProviderRequest, ProviderResponse};
    use secondbrain_knowledge::{ContentProcessor, InMemoryKnowledgeStore, IngestLimits, Ingestor};
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// Streams fixed chunks or fails with a fixed error.
    struct MockProvider {
        outcome: Result<Vec<&'static str>, ProviderError>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                content: "summary".into(),
                model: "mock-model".into(),
            })
        }

        async fn stream_bytes(&self, request: ProviderRequest) -> Result<ByteStream, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let chunks = self.outcome.clone()?;
            let items: Vec<Result<Bytes, ProviderError>> = chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    struct Harness {
        state: SharedState,
        store: Arc<InMemoryKnowledgeStore>,
        provider: Arc<MockProvider>,
    }

    fn harness(outcome: Result<Vec<&'static str>, ProviderError>) -> Harness {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let provider = Arc::new(MockProvider {
            outcome,
            requests: Mutex::new(vec![]),
        });
        let retriever = ContextRetriever::new(store.clone(), &RetrievalConfig::default());
        let pipeline = ChatPipeline::new(retriever, provider.clone(), "mock-model", 0.7);
        let processor =
            ContentProcessor::new(store.clone(), provider.clone(), "mock-model", IngestLimits::default())
                .unwrap();
        let ingestor = Ingestor::new(store.clone(), Arc::new(processor));

        let state = Arc::new(AppState {
            pipeline,
            store: store.clone(),
            ingestor,
        });
        Harness {
            state,
            store,
            provider,
        }
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn chat_streams_upstream_bytes() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";
        let h = harness(Ok(vec![sse]));
        let app = v1_router(h.state);

        let req = post_json(
            "/chat",
            serde_json::json!({"messages": [{"role": "user", "content": "Hello"}]}),
        );
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        assert_eq!(response.headers()["cache-control"], "no-cache");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, sse.as_bytes());
    }

    #[tokio::test]
    async fn chat_injects_knowledge_into_system_turn() {
        let h = harness(Ok(vec![]));
        h.store
            .insert(NewKnowledgeItem::text("Trip notes", "The Lisbon trip is in May"))
            .await
            .unwrap();
        let app = v1_router(h.state);

        let req = post_json(
            "/chat",
            serde_json::json!({"messages": [{"role": "user", "content": "When is the Lisbon trip?"}]}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let requests = h.provider.requests.lock().unwrap();
        let system = &requests[0].messages[0].content;
        assert!(system.contains("[TEXT - Trip notes - Unknown date]"));
        assert!(system.contains("The Lisbon trip is in May"));
    }

    #[tokio::test]
    async fn chat_rate_limit_is_429() {
        let h = harness(Err(ProviderError::RateLimited {
            retry_after_secs: None,
        }));
        let app = v1_router(h.state);

        let req = post_json("/chat", serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}));
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let json = body_json(response).await;
        assert_eq!(json["code"], "rate_limited");
        assert_eq!(json["error"], "Rate limit exceeded. Please try again later.");
    }

    #[tokio::test]
    async fn chat_payment_required_is_402() {
        let h = harness(Err(ProviderError::PaymentRequired("no credits".into())));
        let app = v1_router(h.state);

        let req = post_json("/chat", serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}));
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body_json(response).await["code"], "payment_required");
    }

    #[tokio::test]
    async fn chat_other_upstream_failure_is_500() {
        let h = harness(Err(ProviderError::ApiError {
            status_code: 503,
            message: "overloaded".into(),
        }));
        let app = v1_router(h.state);

        let req = post_json("/chat", serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}));
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["code"], "upstream_error");
        assert!(!json["error"].as_str().unwrap().contains("overloaded"));
    }

    #[tokio::test]
    async fn chat_malformed_body_is_400() {
        let h = harness(Ok(vec![]));
        let app = v1_router(h.state);

        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from("{\"messages\": [oops"))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "invalid_request");
        assert!(h.provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_text_is_accepted_and_listed() {
        let h = harness(Ok(vec![]));
        let app = v1_router(h.state.clone());

        let req = post_json(
            "/knowledge",
            serde_json::json!({"text": "Oat milk in the fridge", "title": "Groceries", "modality": "text"}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let created = body_json(response).await;
        assert_eq!(created["status"], "completed");
        assert_eq!(created["title"], "Groceries");

        let app = v1_router(h.state);
        let req = Request::builder().uri("/knowledge").body(Body::empty()).unwrap();
        let list: KnowledgeListResponse =
            serde_json::from_value(body_json(app.oneshot(req).await.unwrap()).await).unwrap();
        assert_eq!(list.count, 1);
        assert_eq!(list.items[0].status, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn ingest_without_content_is_400() {
        let h = harness(Ok(vec![]));
        let app = v1_router(h.state);

        let req = post_json("/knowledge", serde_json::json!({"modality": "document"}));
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "invalid_request");
    }

    #[tokio::test]
    async fn get_and_delete_by_id() {
        let h = harness(Ok(vec![]));
        let item = h
            .store
            .insert(NewKnowledgeItem::text("Note", "remember the milk"))
            .await
            .unwrap();

        let app = v1_router(h.state.clone());
        let req = Request::builder()
            .uri(format!("/knowledge/{}", item.id))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], item.id.as_str());

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri(format!("/knowledge/{}", item.id))
                .body(Body::empty())
                .unwrap()
        };
        let response = v1_router(h.state.clone()).oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = v1_router(h.state.clone()).oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let req = Request::builder()
            .uri(format!("/knowledge/{}", item.id))
            .body(Body::empty())
            .unwrap();
        let response = v1_router(h.state).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
