use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::task::spawn_blocking;

use crate::detector::{Detector, Diagnosis};
use crate::disease_info::DiseaseInfo;
use crate::labels::ClassLabels;
use crate::error::{AppError, AppResult};
use crate::prediction::ClassScore;
use crate::render::{self, Outcome};

/// Number of runner-up classes returned by the JSON endpoint.
const API_TOP_K: usize = 5;

pub fn router(detector: Detector, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index).post(index_upload))
        .route("/api/v1/predict", post(predict_v1))
        .route("/api/v1/classes", get(classes_v1))
        .route("/healthz", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(detector)
}

async fn index() -> Html<String> {
    Html(render::page(&Outcome::Idle))
}

async fn index_upload(
    State(detector): State<Detector>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return failure_page(rejection.into(), None),
    };
    let file = match read_upload(multipart).await {
        Ok(file) => file,
        Err(err) => return failure_page(err, None),
    };
    let preview = render::data_uri(&file);

    match diagnose(detector, file).await {
        Ok(diagnosis) => Html(render::page(&Outcome::Diagnosed {
            preview,
            diagnosis: &diagnosis,
        }))
        .into_response(),
        Err(err) => failure_page(err, preview),
    }
}

fn failure_page(err: AppError, preview: Option<String>) -> Response {
    err.log();
    let status = err.status();
    let html = render::page(&Outcome::Failed {
        preview,
        message: err.public_message(),
    });
    (status, Html(html)).into_response()
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    label: String,
    class_index: usize,
    confidence: f32,
    top: Vec<ClassScore>,
    info: Option<&'static DiseaseInfo>,
    model_version: String,
}

impl PredictResponse {
    fn new(diagnosis: Diagnosis, labels: &ClassLabels) -> Self {
        let top = diagnosis.prediction.top_k(API_TOP_K, labels);
        Self {
            label: diagnosis.prediction.label,
            class_index: diagnosis.prediction.class_index,
            confidence: diagnosis.prediction.confidence_percent,
            top,
            info: diagnosis.info,
            model_version: diagnosis.model_version,
        }
    }
}

async fn predict_v1(
    State(detector): State<Detector>,
    multipart: Multipart,
) -> AppResult<Json<PredictResponse>> {
    let file = read_upload(multipart).await?;
    let diagnosis = diagnose(detector.clone(), file).await?;
    Ok(Json(PredictResponse::new(diagnosis, detector.labels())))
}

async fn classes_v1(State(detector): State<Detector>) -> Json<Vec<String>> {
    Json(detector.labels().iter().map(str::to_string).collect())
}

async fn read_upload(mut multipart: Multipart) -> AppResult<Bytes> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let bytes = field.bytes().await?;
            tracing::debug!(len = bytes.len(), "received upload");
            file = Some(bytes);
        }
    }

    let file = file.ok_or(AppError::MissingFile)?;
    if file.is_empty() {
        return Err(AppError::EmptyFile);
    }
    Ok(file)
}

async fn diagnose(detector: Detector, file: Bytes) -> AppResult<Diagnosis> {
    let diagnosis = spawn_blocking(move || detector.diagnose(&file)).await??;
    Ok(diagnosis)
}
