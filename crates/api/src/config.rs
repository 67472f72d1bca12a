/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5002`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`). Imports stream many
    /// outbound calls, so this is deliberately generous.
    pub request_timeout_secs: u64,
    /// Timeout for each outbound call to a source or target service
    /// (default: `30`).
    pub upstream_timeout_secs: u64,
    /// Access-control endpoint consulted once per request before any
    /// outbound I/O. Unset means no gate.
    pub access_control_url: Option<String>,
    /// Maximum concurrent referent fetches while enriching one record
    /// (default: `8`).
    pub lookup_fan_out: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default     |
    /// |-------------------------|-------------|
    /// | `HOST`                  | `0.0.0.0`   |
    /// | `PORT`                  | `5002`      |
    /// | `CORS_ORIGINS`          | (empty)     |
    /// | `REQUEST_TIMEOUT_SECS`  | `120`       |
    /// | `UPSTREAM_TIMEOUT_SECS` | `30`        |
    /// | `ACCESS_CONTROL_URL`    | (unset)     |
    /// | `LOOKUP_FAN_OUT`        | `8`         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5002".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let upstream_timeout_secs: u64 = std::env::var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("UPSTREAM_TIMEOUT_SECS must be a valid u64");

        let access_control_url = std::env::var("ACCESS_CONTROL_URL")
            .ok()
            .filter(|s| !s.is_empty());

        let lookup_fan_out: usize = std::env::var("LOOKUP_FAN_OUT")
            .unwrap_or_else(|_| "8".into())
            .parse()
            .expect("LOOKUP_FAN_OUT must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            upstream_timeout_secs,
            access_control_url,
            lookup_fan_out,
        }
    }
}
