use std::env;
use std::str::FromStr;

use crate::constants::{DEFAULT_BUCKET, DEFAULT_IMAGES_TABLE, MAX_UPLOAD_SIZE_BYTES};

/// Which collaborators back the gallery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Hosted backend-as-a-service reached over its REST API
    Hosted,
    /// redb metadata table plus a local object directory
    Local,
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(BackendMode::Hosted),
            "local" => Ok(BackendMode::Local),
            other => Err(format!("Invalid BACKEND_MODE: {}", other)),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    pub backend_mode: BackendMode,
    pub backend_url: Option<String>,
    pub backend_api_key: Option<String>,
    pub storage_bucket: String,
    pub images_table: String,
    pub database_path: String,
    pub storage_dir: String,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port: u16 = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| "Invalid SERVER_PORT")?;

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let backend_mode: BackendMode = env::var("BACKEND_MODE")
            .unwrap_or_else(|_| "local".to_string())
            .parse()?;

        let backend_url = env::var("BACKEND_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string());
        let backend_api_key = env::var("BACKEND_API_KEY").ok();

        if backend_mode == BackendMode::Hosted {
            if backend_url.is_none() {
                return Err("BACKEND_URL must be set when BACKEND_MODE=hosted".to_string());
            }
            if backend_api_key.is_none() {
                return Err("BACKEND_API_KEY must be set when BACKEND_MODE=hosted".to_string());
            }
        }

        let storage_bucket =
            env::var("STORAGE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());
        let images_table =
            env::var("IMAGES_TABLE").unwrap_or_else(|_| DEFAULT_IMAGES_TABLE.to_string());

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/gallery.db".to_string());
        let storage_dir =
            env::var("STORAGE_DIR").unwrap_or_else(|_| "./data/objects".to_string());

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://localhost:{}", server_port));

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(value) => value.parse().map_err(|_| "Invalid MAX_UPLOAD_BYTES")?,
            Err(_) => MAX_UPLOAD_SIZE_BYTES,
        };

        Ok(Config {
            server_host,
            server_port,
            allowed_origins,
            environment,
            backend_mode,
            backend_url,
            backend_api_key,
            storage_bucket,
            images_table,
            database_path,
            storage_dir,
            public_base_url,
            max_upload_bytes,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_mode_parsing() {
        assert_eq!("hosted".parse::<BackendMode>(), Ok(BackendMode::Hosted));
        assert_eq!(" Local ".parse::<BackendMode>(), Ok(BackendMode::Local));
        assert_eq!("HOSTED".parse::<BackendMode>(), Ok(BackendMode::Hosted));
        assert!("s3".parse::<BackendMode>().is_err());
    }

    #[test]
    fn test_server_address() {
        let config = Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            allowed_origins: vec![],
            environment: "test".to_string(),
            backend_mode: BackendMode::Local,
            backend_url: None,
            backend_api_key: None,
            storage_bucket: DEFAULT_BUCKET.to_string(),
            images_table: DEFAULT_IMAGES_TABLE.to_string(),
            database_path: String::new(),
            storage_dir: String::new(),
            public_base_url: "http://localhost:3000".to_string(),
            max_upload_bytes: MAX_UPLOAD_SIZE_BYTES,
        };

        assert_eq!(config.server_address(), "127.0.0.1:3000");
    }
}
