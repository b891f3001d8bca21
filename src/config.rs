use std::{env, path::PathBuf, time::Duration};

/// Backend base URL used when running locally without `CRM_API_URL`.
pub const LOCAL_API_URL: &str = "http://localhost:8000/api/v1";

const DEFAULT_SESSION_FILE: &str = ".crm-portal/session.json";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// AppConfig
///
/// The portal's whole configuration, loaded once at start-up and immutable afterwards.
/// Handlers reach it through `FromRef` on the shared `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which settings are mandatory.
    pub env: Env,
    // Base URL of the CRM REST backend, without trailing slash (e.g. http://host/api/v1).
    pub api_url: String,
    // Where the bearer credential is persisted between runs.
    pub session_file: PathBuf,
    // Address the portal listens on.
    pub bind_addr: String,
    // Upper bound for any single backend call.
    pub request_timeout: Duration,
}

/// Env
///
/// Runtime context. `Production` insists on an explicit backend URL and emits JSON logs.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe values for tests; nothing here touches the process environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_url: LOCAL_API_URL.to_string(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables (after `.env` has been
    /// applied by the caller).
    ///
    /// # Panics
    /// Panics in production when `CRM_API_URL` is not set: the portal refuses to start
    /// pointing at a guessed backend.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let api_url = match env {
            Env::Production => {
                env::var("CRM_API_URL").expect("FATAL: CRM_API_URL must be set in production.")
            }
            Env::Local => env::var("CRM_API_URL").unwrap_or_else(|_| LOCAL_API_URL.to_string()),
        };

        let session_file = env::var("PORTAL_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SESSION_FILE));

        let bind_addr =
            env::var("PORTAL_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        // Unparsable values fall back to the default rather than aborting start-up.
        let timeout_secs = env::var("CRM_API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            env,
            api_url: api_url.trim_end_matches('/').to_string(),
            session_file,
            bind_addr,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}
