use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be a socket address, got {value:?}")]
    InvalidAddr { name: &'static str, value: String },
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Runtime settings, read once at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub model_dir: PathBuf,
    pub http_addr: SocketAddr,
    pub grpc_addr: SocketAddr,
    pub max_upload_bytes: usize,
    pub intra_threads: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let model_dir = PathBuf::from(lookup("MODEL_DIR").unwrap_or_else(|| "model".to_string()));
        let http_addr = parse_addr("HTTP_ADDR", lookup("HTTP_ADDR"), "0.0.0.0:8080")?;
        let grpc_addr = parse_addr("GRPC_ADDR", lookup("GRPC_ADDR"), "[::1]:50051")?;
        let max_upload_mb = lookup("MAX_UPLOAD_MB");
        let max_upload_bytes = parse_positive("MAX_UPLOAD_MB", max_upload_mb.clone(), 20)?
            .checked_mul(1024 * 1024)
            .ok_or_else(|| ConfigError::InvalidNumber {
                name: "MAX_UPLOAD_MB",
                value: max_upload_mb.unwrap_or_default(),
            })?;
        let intra_threads = parse_positive("INTRA_THREADS", lookup("INTRA_THREADS"), num_cpus::get())?;

        Ok(Self {
            model_dir,
            http_addr,
            grpc_addr,
            max_upload_bytes,
            intra_threads,
        })
    }
}

fn parse_addr(
    name: &'static str,
    value: Option<String>,
    default: &str,
) -> Result<SocketAddr, ConfigError> {
    let value = value.unwrap_or_else(|| default.to_string());
    value
        .parse()
        .map_err(|_| ConfigError::InvalidAddr { name, value })
}

fn parse_positive(
    name: &'static str,
    value: Option<String>,
    default: usize,
) -> Result<usize, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => match value.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidNumber { name, value }),
        },
    }
}
