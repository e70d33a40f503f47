use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "PEXP";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Key under which the whole wizard snapshot is stored. The suffix is the
/// snapshot format version; bump it when the shape changes incompatibly.
pub const DRAFT_STORAGE_KEY: &str = "pexp_wizard_autosave_v2";

/// Number of wizard steps (Welcome, Pain Map, Medical History, Goals, Review).
pub const TOTAL_STEPS: u8 = 5;

/// Quiet period after the last mutation before the draft is written.
pub const AUTOSAVE_DEBOUNCE_MS: u64 = 800;

/// Fallback save interval, independent of user activity.
pub const AUTOSAVE_FALLBACK_SECS: u64 = 30;

/// Intensity preselected in the confirmation modal (slider midpoint).
pub const DEFAULT_PAIN_INTENSITY: u8 = 5;

/// Alpha values below this count as a click on transparent diagram space.
pub const ALPHA_MISS_THRESHOLD: u8 = 10;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Get the application data directory.
/// `<platform data dir>/pexp`, falling back to the working directory.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pexp")
}

/// SQLite file holding local drafts and backend submissions.
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("pexp.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "pexp_lib=info,pexp=info,tower_http=info"
}

pub fn autosave_debounce() -> Duration {
    Duration::from_millis(AUTOSAVE_DEBOUNCE_MS)
}

pub fn autosave_fallback_interval() -> Duration {
    Duration::from_secs(AUTOSAVE_FALLBACK_SECS)
}

// ═══════════════════════════════════════════════════════════
// Runtime settings
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Runtime settings, read once at startup from `PEXP_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub ollama_url: String,
    /// `None` disables the AI summary endpoints (they answer 503).
    pub summary_model: Option<String>,
    /// Base URL the wizard client posts to.
    pub backend_url: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup("PEXP_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw.parse().map_err(|e| ConfigError::InvalidValue {
            var: "PEXP_BIND_ADDR",
            reason: format!("{bind_raw}: {e}"),
        })?;

        let data_dir = lookup("PEXP_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);

        let ollama_url = lookup("PEXP_OLLAMA_URL")
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !ollama_url.starts_with("http://") && !ollama_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "PEXP_OLLAMA_URL",
                reason: format!("{ollama_url}: expected an http(s) URL"),
            });
        }

        let summary_model = lookup("PEXP_SUMMARY_MODEL")
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        let backend_url = lookup("PEXP_BACKEND_URL")
            .unwrap_or_else(|| format!("http://{bind_addr}"))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            bind_addr,
            data_dir,
            ollama_url,
            summary_model,
            backend_url,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        database_path(&self.data_dir)
    }
}
