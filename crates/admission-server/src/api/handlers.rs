use axum::{
    extract::{self, FromRequest},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::api::{
    admission_review::{AdmissionReviewRequest, AdmissionReviewResponse},
    api_error::ApiError,
    populate_span_with_admission_request_data, populate_span_with_admission_response,
    state::ApiServerState,
};

// create an extractor that internally uses `axum::Json` but has a custom rejection
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub(crate) struct JsonExtractor<T>(T);

impl<T: Serialize> IntoResponse for JsonExtractor<T> {
    fn into_response(self) -> axum::response::Response {
        let Self(value) = self;
        axum::Json(value).into_response()
    }
}

fn log_admission_review(admission_review: &AdmissionReviewRequest) {
    match serde_json::to_string(admission_review) {
        Ok(payload) => debug!(admission_review = payload.as_str()),
        Err(e) => debug!(error = %e, "cannot serialize admission review"),
    }
}

#[tracing::instrument(
    name = "mutation",
    fields(
        request_uid=tracing::field::Empty,
        host=crate::config::HOSTNAME.as_str(),
        name=tracing::field::Empty,
        namespace=tracing::field::Empty,
        operation=tracing::field::Empty,
        kind_group=tracing::field::Empty,
        kind_version=tracing::field::Empty,
        kind=tracing::field::Empty,
        user=tracing::field::Empty,
        allowed=tracing::field::Empty,
        mutated=tracing::field::Empty,
        response_code=tracing::field::Empty,
        response_message=tracing::field::Empty,
    ),
    skip_all)]
/// Stamp the scheduler name, identity labels and annotations on a workload.
pub(crate) async fn mutate_handler(
    extract::State(state): extract::State<Arc<ApiServerState>>,
    JsonExtractor(admission_review): JsonExtractor<AdmissionReviewRequest>,
) -> Json<AdmissionReviewResponse> {
    log_admission_review(&admission_review);

    if let Some(request) = admission_review.request.as_ref() {
        populate_span_with_admission_request_data(request);
    }

    let response = state
        .mutation_engine
        .mutate(admission_review.request.as_ref());

    populate_span_with_admission_response(&response);

    Json(AdmissionReviewResponse::new(response))
}

#[tracing::instrument(
    name = "config_validation",
    fields(
        request_uid=tracing::field::Empty,
        host=crate::config::HOSTNAME.as_str(),
        name=tracing::field::Empty,
        namespace=tracing::field::Empty,
        operation=tracing::field::Empty,
        kind_group=tracing::field::Empty,
        kind_version=tracing::field::Empty,
        kind=tracing::field::Empty,
        user=tracing::field::Empty,
        allowed=tracing::field::Empty,
        mutated=tracing::field::Empty,
        response_code=tracing::field::Empty,
        response_message=tracing::field::Empty,
    ),
    skip_all)]
/// Check a change of the scheduler configuration with the scheduler.
pub(crate) async fn validate_conf_handler(
    extract::State(state): extract::State<Arc<ApiServerState>>,
    JsonExtractor(admission_review): JsonExtractor<AdmissionReviewRequest>,
) -> Json<AdmissionReviewResponse> {
    log_admission_review(&admission_review);

    if let Some(request) = admission_review.request.as_ref() {
        populate_span_with_admission_request_data(request);
    }

    let response = state
        .config_validation_engine
        .review(admission_review.request.as_ref())
        .await;

    populate_span_with_admission_response(&response);

    Json(AdmissionReviewResponse::new(response))
}

pub(crate) async fn health_handler() -> StatusCode {
    StatusCode::OK
}
