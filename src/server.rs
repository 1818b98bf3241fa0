use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{web, HttpResponse, Responder};
use http::StatusCode;

use crate::evaluation::parse_evaluation;
use crate::interview::{
    dispatch, ChatPlan, EvaluationPlan, Instruction, InterviewMode, CHAT_FALLBACK,
    EVALUATION_FALLBACK,
};
use crate::models::chat::ChatRequest;
use crate::models::evaluation::{EvaluationPayload, EvaluationResponse};
use crate::relay::{data_stream_response, fallback_stream, FrameRelay};
use crate::util::{error_response, AppState};

const REQUEST_ID_HEADER: &str = "x-request-id";

const ROUTES: [&str; 3] = ["/api/chat", "/status", "/health"];

/// Configure Actix-web routes with AppState.
pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .route("/api/chat", web::post().to(chat))
            .route("/status", web::get().to(status))
            .route("/health", web::get().to(health)),
    );
}

async fn health() -> impl Responder {
    web::Json(serde_json::json!({ "status": "ok" }))
}

/// Service status: name, version, model and whether credentials are present.
async fn status(state: web::Data<AppState>) -> impl Responder {
    web::Json(serde_json::json!({
        "name": "interview-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model.model_id(),
        "routes": ROUTES,
        "api_key_configured": state.model.is_configured(),
        "generation": {
            "chat": state.config.chat_generation,
            "evaluation": state.config.evaluation_generation,
        }
    }))
}

fn with_request_id(mut resp: HttpResponse, request_id: &str) -> HttpResponse {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        resp.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    resp
}

/// `POST /api/chat`: streamed interview turn or one-shot evaluation.
///
/// The body is read as raw bytes so a malformed payload maps to the
/// `{ error, details }` contract instead of the extractor's default 400.
async fn chat(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let request_id = uuid::Uuid::new_v4().to_string();

    let payload: ChatRequest = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Error in chat API");
            return with_request_id(
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to process the request",
                    &e.to_string(),
                ),
                &request_id,
            );
        }
    };

    let mode = dispatch(&payload.messages);
    tracing::info!(
        request_id = %request_id,
        mode = mode.name(),
        messages = payload.messages.len(),
        model = state.model.model_id(),
        "Processing chat request"
    );

    let resp = match mode {
        InterviewMode::Evaluation(plan) => evaluate(&state, plan, &request_id).await,
        InterviewMode::Chat(plan) => stream_turn(&state, plan, &request_id).await,
    };
    with_request_id(resp, &request_id)
}

async fn evaluate(state: &AppState, plan: EvaluationPlan, request_id: &str) -> HttpResponse {
    let turns = plan.history.len();
    let req = plan.into_request(state.config.evaluation_generation.clone());

    let payload = match state.model.generate(&req).await {
        Ok(text) => {
            tracing::debug!(request_id = %request_id, turns, chars = text.len(), "Evaluation generated");
            parse_evaluation(&text)
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Error generating evaluation");
            EvaluationPayload::Message(EVALUATION_FALLBACK.to_string())
        }
    };

    HttpResponse::Ok().json(EvaluationResponse::new(payload))
}

async fn stream_turn(state: &AppState, plan: ChatPlan, request_id: &str) -> HttpResponse {
    match plan.instruction {
        Instruction::Terminate => tracing::info!(
            request_id = %request_id,
            exchanges = plan.exchange_count,
            "Exchange limit reached; closing interview"
        ),
        _ => tracing::debug!(
            request_id = %request_id,
            exchanges = plan.exchange_count,
            "Conversation exchange count"
        ),
    }

    let req = plan.into_request(state.config.chat_generation.clone());
    match state.model.generate_stream(&req).await {
        Ok(tokens) => data_stream_response(FrameRelay::new(tokens, CHAT_FALLBACK)),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Error generating response");
            data_stream_response(fallback_stream(CHAT_FALLBACK))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::provider::{GenerateRequest, GenerativeModel, ProviderError, TokenStream};
    use actix_web::{test, App};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Unavailable;

    #[async_trait]
    impl GenerativeModel for Unavailable {
        fn model_id(&self) -> &str {
            "unavailable"
        }

        fn is_configured(&self) -> bool {
            false
        }

        async fn generate(&self, _req: &GenerateRequest) -> Result<String, ProviderError> {
            Err(ProviderError::MissingApiKey("GEMINI_API_KEY".into()))
        }

        async fn generate_stream(
            &self,
            _req: &GenerateRequest,
        ) -> Result<TokenStream, ProviderError> {
            Err(ProviderError::MissingApiKey("GEMINI_API_KEY".into()))
        }
    }

    fn state() -> AppState {
        AppState::new(Arc::new(Unavailable), RelayConfig::default())
    }

    #[actix_web::test]
    async fn health_and_status_report_service_state() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(config_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");

        let req = test::TestRequest::get().uri("/status").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "interview-relay");
        assert_eq!(body["model"], "unavailable");
        assert_eq!(body["api_key_configured"], false);
        assert_eq!(body["routes"][0], "/api/chat");
    }

    #[actix_web::test]
    async fn provider_failure_streams_chat_fallback() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(config_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(serde_json::json!({ "messages": [{ "role": "user", "content": "Hi" }] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
        let body = test::read_body(resp).await;
        let expected = format!(
            "0:{}\n0:\"__DONE__\"\n",
            serde_json::Value::from(CHAT_FALLBACK)
        );
        assert_eq!(body, expected.as_bytes());
    }

    #[actix_web::test]
    async fn provider_failure_on_evaluation_returns_apology() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(config_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(serde_json::json!({
                "messages": [{ "role": "user", "content": "[EVALUATE_CANDIDATE]" }]
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["isEvaluation"], true);
        assert_eq!(body["response"], EVALUATION_FALLBACK);
    }
}
