use tokio::task::spawn_blocking;
use tonic::{Request, Response, Status};

use crate::detector::{Detector, Diagnosis};
use crate::labels::ClassLabels;
use crate::plant_model::ModelError;

pub mod plant_disease_service {
    tonic::include_proto!("plant_disease_service");

    pub(crate) const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("plant_disease_descriptor");
}

use plant_disease_service::{
    ClassList, ClassScore, DetectionRequest, DetectionResponse, DiseaseInfo, Empty,
    detection_request::ImageSource,
    plant_disease_detector_server::{PlantDiseaseDetector, PlantDiseaseDetectorServer},
};

pub struct PlantDiseaseService {
    detector: Detector,
    http: reqwest::Client,
    max_image_bytes: usize,
}

impl PlantDiseaseService {
    pub fn new(detector: Detector, http: reqwest::Client, max_image_bytes: usize) -> Self {
        Self {
            detector,
            http,
            max_image_bytes,
        }
    }

    pub fn into_server(self) -> PlantDiseaseDetectorServer<Self> {
        let limit = self.max_image_bytes;
        PlantDiseaseDetectorServer::new(self).max_decoding_message_size(limit + 1024)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, Status> {
        tracing::debug!(%url, "fetching image");
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Status::unavailable(format!("failed to fetch image_url: {e}")))?;
        if response
            .content_length()
            .is_some_and(|len| len as usize > self.max_image_bytes)
        {
            return Err(oversized());
        }

        // Chunked responses carry no length, so enforce the limit while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Status::unavailable(format!("failed to read image_url body: {e}")))?
        {
            if body.len() + chunk.len() > self.max_image_bytes {
                return Err(oversized());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

fn oversized() -> Status {
    Status::invalid_argument("image_url points to an oversized image")
}

fn model_status(err: ModelError) -> Status {
    match err {
        ModelError::UnsupportedFormat | ModelError::ImageProcessing(_) => {
            Status::invalid_argument(err.to_string())
        }
        err => {
            tracing::error!(error = ?err, "inference failed");
            Status::internal("inference failed")
        }
    }
}

fn to_response(
    request_id: String,
    diagnosis: Diagnosis,
    labels: &ClassLabels,
    top_k: usize,
) -> DetectionResponse {
    let prediction = &diagnosis.prediction;
    DetectionResponse {
        request_id,
        predicted_class: prediction.label.clone(),
        class_index: prediction.class_index as u32,
        confidence: prediction.confidence_percent,
        scores: prediction
            .top_k(top_k, labels)
            .into_iter()
            .map(|s| ClassScore {
                label: s.label,
                score: s.probability,
            })
            .collect(),
        info: diagnosis.info.map(|info| DiseaseInfo {
            cause: info.cause.to_string(),
            symptoms: info.symptoms.to_string(),
            treatment: info.treatment.to_string(),
        }),
        model_version: diagnosis.model_version,
    }
}

#[tonic::async_trait]
impl PlantDiseaseDetector for PlantDiseaseService {
    async fn detect_disease(
        &self,
        request: Request<DetectionRequest>,
    ) -> Result<Response<DetectionResponse>, Status> {
        let request = request.into_inner();
        tracing::debug!(request_id = %request.request_id, "detect_disease");

        let bytes = match request.image_source {
            Some(ImageSource::ImageData(data)) if !data.is_empty() => data,
            Some(ImageSource::ImageUrl(url)) if !url.is_empty() => self.fetch_image(&url).await?,
            _ => return Err(Status::invalid_argument("No valid image data provided")),
        };

        let detector = self.detector.clone();
        let diagnosis = spawn_blocking(move || detector.diagnose(&bytes))
            .await
            .map_err(|e| Status::internal(format!("inference task failed: {e}")))?
            .map_err(model_status)?;

        Ok(Response::new(to_response(
            request.request_id,
            diagnosis,
            self.detector.labels(),
            request.top_k as usize,
        )))
    }

    async fn list_classes(&self, _request: Request<Empty>) -> Result<Response<ClassList>, Status> {
        Ok(Response::new(ClassList {
            labels: self.detector.labels().iter().map(str::to_string).collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::tests::{detector, encode};
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use futures_util::StreamExt;
    use image::ImageFormat;
    use std::net::SocketAddr;
    use tonic::Code;

    const CHUNK: usize = 128 * 1024;

    /// Serves a leaf image, a 404 and an 8 MiB chunked body with no
    /// Content-Length on a random local port.
    async fn image_host() -> SocketAddr {
        let png = encode(ImageFormat::Png);
        let router = Router::new()
            .route("/leaf.png", get(move || async move { png }))
            .route("/gone.png", get(|| async { (StatusCode::NOT_FOUND, "gone") }))
            .route(
                "/huge.png",
                get(|| async {
                    let chunks = futures_util::stream::iter(0..64)
                        .map(|_| Ok::<_, std::io::Error>(vec![0u8; CHUNK]));
                    Body::from_stream(chunks)
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        addr
    }

    fn url_request(addr: SocketAddr, path: &str) -> Request<DetectionRequest> {
        request(Some(ImageSource::ImageUrl(format!("http://{addr}{path}"))), 0)
    }

    fn service(scores: Vec<f32>) -> PlantDiseaseService {
        PlantDiseaseService::new(detector(scores), reqwest::Client::new(), 1024 * 1024)
    }

    fn request(source: Option<ImageSource>, top_k: u32) -> Request<DetectionRequest> {
        Request::new(DetectionRequest {
            request_id: "req-1".to_string(),
            image_source: source,
            top_k,
        })
    }

    #[tokio::test]
    async fn detects_from_inline_bytes() {
        let response = service(vec![0.05, 0.05, 0.05, 0.05, 0.75, 0.05])
            .detect_disease(request(
                Some(ImageSource::ImageData(encode(ImageFormat::Png))),
                2,
            ))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.request_id, "req-1");
        assert_eq!(response.predicted_class, "Tomato___healthy");
        assert_eq!(response.class_index, 4);
        assert!((response.confidence - 75.0).abs() < 1e-3);
        assert_eq!(response.scores.len(), 2);
        assert_eq!(response.scores[0].label, "Tomato___healthy");
        assert!(response.info.unwrap().cause.contains("healthy plant"));
    }

    #[tokio::test]
    async fn zero_top_k_returns_every_class() {
        let response = service(vec![0.5, 0.1, 0.1, 0.1, 0.1, 0.1])
            .detect_disease(request(
                Some(ImageSource::ImageData(encode(ImageFormat::Jpeg))),
                0,
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.scores.len(), 6);
    }

    #[tokio::test]
    async fn missing_image_is_invalid_argument() {
        let svc = service(vec![1.0]);
        let status = svc.detect_disease(request(None, 0)).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let status = svc
            .detect_disease(request(Some(ImageSource::ImageData(Vec::new())), 0))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn unsupported_format_is_invalid_argument() {
        let status = service(vec![1.0])
            .detect_disease(request(
                Some(ImageSource::ImageData(encode(ImageFormat::Bmp))),
                0,
            ))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn detects_from_fetched_url() {
        let addr = image_host().await;
        let response = service(vec![0.8, 0.04, 0.04, 0.04, 0.04, 0.04])
            .detect_disease(url_request(addr, "/leaf.png"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.predicted_class, "Tomato___Bacterial_spot");
        assert_eq!(response.scores.len(), 6);
    }

    #[tokio::test]
    async fn upstream_error_is_unavailable() {
        let addr = image_host().await;
        let status = service(vec![1.0])
            .detect_disease(url_request(addr, "/gone.png"))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[tokio::test]
    async fn chunked_body_over_limit_is_invalid_argument() {
        let addr = image_host().await;
        let status = service(vec![1.0])
            .detect_disease(url_request(addr, "/huge.png"))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().contains("oversized"));
    }

    #[tokio::test]
    async fn lists_classes() {
        let list = service(vec![1.0])
            .list_classes(Request::new(Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(list.labels.len(), 6);
        assert_eq!(list.labels[3], "Tomato___Leaf_Mold");
    }
}
