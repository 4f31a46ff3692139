use crate::domain::value_objects::RoutingMode;
use crate::infrastructure::async_log::DEFAULT_LOG_BACKLOG;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Databases
    pub db_paths: Vec<String>,
    pub routing_mode: RoutingMode,

    // HTTP API
    pub listen_host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,

    // Access log
    pub log_file: Option<String>,
    pub log_backlog: usize,

    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_paths: Vec::new(),
            routing_mode: RoutingMode::Auto,
            listen_host: "0.0.0.0".to_string(),
            port: 80,
            shutdown_timeout_secs: 10,
            log_file: None,
            log_backlog: DEFAULT_LOG_BACKLOG,
            debug: false,
        }
    }
}

impl Config {
    /// Address the HTTP API binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_paths.is_empty() {
            return Err(ConfigError::MissingDbPath);
        }
        if self.log_backlog == 0 {
            return Err(ConfigError::ZeroLogBacklog);
        }
        if self.routing_mode == RoutingMode::Single && self.db_paths.len() != 1 {
            return Err(ConfigError::SingleModeNeedsOneDb(self.db_paths.len()));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one database path is required (GEOSERVE_DB_PATHS)")]
    MissingDbPath,
    #[error("log backlog must be positive")]
    ZeroLogBacklog,
    #[error("single routing mode needs exactly one database, got {0}")]
    SingleModeNeedsOneDb(usize),
    #[error("unknown routing mode {0:?} (expected auto, probe or single)")]
    UnknownRoutingMode(String),
}

pub fn load_config() -> anyhow::Result<Config> {
    let db_paths = std::env::var("GEOSERVE_DB_PATHS")
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let routing_mode = match std::env::var("GEOSERVE_ROUTING_MODE") {
        Ok(v) => RoutingMode::from_str(&v).ok_or(ConfigError::UnknownRoutingMode(v))?,
        Err(_) => RoutingMode::Auto,
    };

    let listen_host = std::env::var("GEOSERVE_LISTEN_HOST")
        .unwrap_or_else(|_| "0.0.0.0".to_string());

    let port = std::env::var("GEOSERVE_PORT")
        .unwrap_or_else(|_| "80".to_string())
        .parse()
        .unwrap_or(80);

    let shutdown_timeout_secs = std::env::var("GEOSERVE_SHUTDOWN_TIMEOUT_SECS")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .unwrap_or(10);

    let log_file = std::env::var("GEOSERVE_LOG_FILE")
        .ok()
        .filter(|v| !v.is_empty());

    let log_backlog = std::env::var("GEOSERVE_LOG_BACKLOG")
        .unwrap_or_else(|_| DEFAULT_LOG_BACKLOG.to_string())
        .parse()
        .unwrap_or(DEFAULT_LOG_BACKLOG);

    let debug = std::env::var("DEBUG").is_ok();

    let config = Config {
        db_paths,
        routing_mode,
        listen_host,
        port,
        shutdown_timeout_secs,
        log_file,
        log_backlog,
        debug,
    };
    config.validate()?;
    Ok(config)
}
