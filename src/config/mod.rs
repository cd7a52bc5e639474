use std::env;
use std::path::PathBuf;

/// Runtime configuration for the conversion service.
///
/// Every value can be overridden through the environment; nothing in the
/// crate reads a module-level constant. The storage directory is injected
/// into the [`StagingStore`](crate::services::staging::StagingStore) at
/// construction.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory where uploads and derived artifacts are staged (default: "uploads")
    pub storage_dir: PathBuf,

    /// Maximum request body size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Hard timeout for one external tool invocation, in seconds (default: 120)
    pub tool_timeout_secs: u64,

    /// LibreOffice executable used for Word -> PDF conversion (default: "soffice")
    pub soffice_bin: String,

    /// Ghostscript executable used for compression and rasterization (default: "gs")
    pub gs_bin: String,

    /// qpdf executable used for encrypt/decrypt (default: "qpdf")
    pub qpdf_bin: String,

    /// TCP port to bind (default: 8000)
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("uploads"),
            max_file_size: 256 * 1024 * 1024, // 256 MB
            tool_timeout_secs: 120,
            soffice_bin: "soffice".to_string(),
            gs_bin: "gs".to_string(),
            qpdf_bin: "qpdf".to_string(),
            port: 8000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.storage_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            tool_timeout_secs: env::var("TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.tool_timeout_secs),

            soffice_bin: env::var("SOFFICE_BIN").unwrap_or(default.soffice_bin),

            gs_bin: env::var("GS_BIN").unwrap_or(default.gs_bin),

            qpdf_bin: env::var("QPDF_BIN").unwrap_or(default.qpdf_bin),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.storage_dir, PathBuf::from("uploads"));
        assert_eq!(config.max_file_size, 256 * 1024 * 1024);
        assert_eq!(config.tool_timeout_secs, 120);
        assert_eq!(config.soffice_bin, "soffice");
        assert_eq!(config.gs_bin, "gs");
        assert_eq!(config.qpdf_bin, "qpdf");
        assert_eq!(config.port, 8000);
    }
}
