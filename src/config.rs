use std::{path::PathBuf, sync::LazyLock};

use image_bus::DEFAULT_QUALITY;

const DEFAULT_PORT: u16 = 3000;
/// Upper bound on a whole multipart request body.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
const STATIC_DIR: &str = "public";

pub struct ConvertConfig {
    port: u16,
    quality: u8,
    static_dir: PathBuf,
    max_upload_bytes: usize,
}

impl ConvertConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            quality: DEFAULT_QUALITY,
            static_dir: PathBuf::from(STATIC_DIR),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    /// Reads `PORT`, falling back to 3000 when unset or unparsable.
    pub fn from_env() -> Self {
        let port = match std::env::var("PORT") {
            Ok(value) => value.parse().unwrap_or_else(|_| {
                log::warn!("invalid PORT {:?}, using {}", value, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };
        Self::new(port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn static_dir(&self) -> &PathBuf {
        &self.static_dir
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }
}

pub fn config() -> &'static ConvertConfig {
    static CONFIG: LazyLock<ConvertConfig> = LazyLock::new(ConvertConfig::from_env);
    &CONFIG
}
