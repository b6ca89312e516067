use std::future::IntoFuture;
use std::sync::Arc;

use tonic::transport::Server;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

mod config;
mod detector;
mod disease_info;
mod error;
mod grpc;
mod labels;
mod model_config;
mod plant_model;
mod prediction;
mod render;
mod web;

use config::Config;
use detector::Detector;
use grpc::{PlantDiseaseService, plant_disease_service};
use labels::{CLASS_LABELS_FILE, ClassLabels};
use plant_model::OnnxClassifier;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "plant_disease_detector=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "starting plant disease detector");

    let labels = ClassLabels::load(&config.model_dir.join(CLASS_LABELS_FILE))?;
    let classifier = OnnxClassifier::new(&config.model_dir, config.intra_threads)?;
    let detector = Detector::new(Arc::new(classifier), labels);
    tracing::info!(
        version = detector.model_version(),
        classes = detector.labels().len(),
        "model ready"
    );

    let router =
        web::router(detector.clone(), config.max_upload_bytes).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    tracing::info!("web page listening on http://{}", config.http_addr);

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(plant_disease_service::FILE_DESCRIPTOR_SET)
        .build_v1()?;
    let grpc_service =
        PlantDiseaseService::new(detector, reqwest::Client::new(), config.max_upload_bytes);
    tracing::info!("PlantDiseaseDetector gRPC listening on {}", config.grpc_addr);

    let http_server = axum::serve(listener, router).into_future();
    let grpc_server = Server::builder()
        .add_service(grpc_service.into_server())
        .add_service(reflection_service)
        .serve(config.grpc_addr);

    tokio::select! {
        result = http_server => result?,
        result = grpc_server => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}
