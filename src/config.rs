use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::util::{is_local_endpoint_url, non_empty_trimmed, parse_bool_flag};

pub const DEFAULT_API_URL: &str = "https://chatgpt.com/backend-api/codex/responses";
pub const DEFAULT_MODEL: &str = "gpt-5-codex-mini";
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_MAX_TURNS: usize = 6;
pub const DEFAULT_HANDOFF_FOCUS_COMMAND: &str = "chatgpt.sidebarView.focus";
pub const DEFAULT_HANDOFF_ADD_FILE_COMMAND: &str = "chatgpt.addFileToThread";

const API_URL_ENV: &str = "VOX_API_URL";
const API_KEY_ENV: &str = "VOX_API_KEY";
const AUTH_FILE_ENV: &str = "VOX_AUTH_FILE";
const ACCOUNT_ID_ENV: &str = "VOX_ACCOUNT_ID";
const MODEL_ENV: &str = "VOX_MODEL";
const TIMEOUT_ENV: &str = "VOX_TIMEOUT_MS";
const STREAM_ENV: &str = "VOX_STREAM";
const MAX_TURNS_ENV: &str = "VOX_MAX_TURNS";
const HANDOFF_FOCUS_ENV: &str = "VOX_HANDOFF_FOCUS_COMMAND";
const HANDOFF_ADD_FILE_ENV: &str = "VOX_HANDOFF_ADD_FILE_COMMAND";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_url: String,
    pub api_key: Option<String>,
    pub account_id: Option<String>,
    pub model: String,
    pub timeout_ms: u64,
    pub stream: bool,
    pub max_turns: usize,
    pub handoff: HandoffCommands,
    pub working_dir: PathBuf,
}

/// Host command ids used to deliver `agent ...` prompts to an assistant panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandoffCommands {
    pub focus: String,
    pub add_file: String,
}

impl Default for HandoffCommands {
    fn default() -> Self {
        Self {
            focus: DEFAULT_HANDOFF_FOCUS_COMMAND.to_string(),
            add_file: DEFAULT_HANDOFF_ADD_FILE_COMMAND.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AuthFile {
    #[serde(default)]
    tokens: Option<AuthTokens>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthTokens {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    account_id: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let api_url = env_non_empty(API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let auth = env_non_empty(API_KEY_ENV)
            .is_none()
            .then(|| load_auth_file(&resolve_auth_file_path()))
            .flatten();

        let api_key = env_non_empty(API_KEY_ENV).or_else(|| {
            auth.as_ref()
                .and_then(|tokens| tokens.access_token.as_deref())
                .and_then(non_empty_trimmed)
                .map(ToOwned::to_owned)
        });
        let account_id = env_non_empty(ACCOUNT_ID_ENV).or_else(|| {
            auth.as_ref()
                .and_then(|tokens| tokens.account_id.as_deref())
                .and_then(non_empty_trimmed)
                .map(ToOwned::to_owned)
        });

        let timeout_ms = env_non_empty(TIMEOUT_ENV)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .clamp(1_000, 300_000);
        let stream = std::env::var(STREAM_ENV)
            .ok()
            .and_then(parse_bool_flag)
            .unwrap_or(true);
        let max_turns = env_non_empty(MAX_TURNS_ENV)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_TURNS)
            .clamp(1, 32);

        let handoff = HandoffCommands {
            focus: env_non_empty(HANDOFF_FOCUS_ENV)
                .unwrap_or_else(|| DEFAULT_HANDOFF_FOCUS_COMMAND.to_string()),
            add_file: env_non_empty(HANDOFF_ADD_FILE_ENV)
                .unwrap_or_else(|| DEFAULT_HANDOFF_ADD_FILE_COMMAND.to_string()),
        };

        Ok(Self {
            api_url,
            api_key,
            account_id,
            model: env_non_empty(MODEL_ENV).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_ms,
            stream,
            max_turns,
            handoff,
            working_dir: std::env::current_dir().context("Failed to resolve working directory")?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid VOX_API_URL '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if !self.is_local_endpoint() && self.api_key.is_none() {
            bail!(
                "VOX_API_KEY (or an auth file token) must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        if self.model.trim().is_empty() {
            bail!("VOX_MODEL must not be empty");
        }

        if self.max_turns == 0 {
            bail!("VOX_MAX_TURNS must be at least 1");
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn resolve_auth_file_path() -> PathBuf {
    env_non_empty(AUTH_FILE_ENV)
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".codex").join("auth.json")))
        .unwrap_or_else(|| PathBuf::from(".codex/auth.json"))
}

/// Missing or unreadable auth files are not an error; the token is optional
/// until `validate()` decides otherwise.
fn load_auth_file(path: &Path) -> Option<AuthTokens> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<AuthFile>(&raw) {
        Ok(parsed) => parsed.tokens,
        Err(error) => {
            tracing::debug!(path = %path.display(), %error, "ignoring malformed auth file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScrubbedEnv, ENV_LOCK};
    use tempfile::TempDir;

    const ALL_KEYS: &[&str] = &[
        API_URL_ENV,
        API_KEY_ENV,
        AUTH_FILE_ENV,
        ACCOUNT_ID_ENV,
        MODEL_ENV,
        TIMEOUT_ENV,
        STREAM_ENV,
        MAX_TURNS_ENV,
        HANDOFF_FOCUS_ENV,
        HANDOFF_ADD_FILE_ENV,
    ];

    #[test]
    fn test_load_defaults_without_env() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let env = ScrubbedEnv::new(ALL_KEYS);
        let temp = TempDir::new().expect("temp dir");
        env.set(AUTH_FILE_ENV, &temp.path().join("missing.json").to_string_lossy());

        let config = Config::load().expect("config should load");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.max_turns, DEFAULT_MAX_TURNS);
        assert!(config.stream);
        assert!(config.api_key.is_none());
        assert_eq!(config.handoff, HandoffCommands::default());
    }

    #[test]
    fn test_load_reads_token_and_account_from_auth_file() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let env = ScrubbedEnv::new(ALL_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let auth_path = temp.path().join("auth.json");
        std::fs::write(
            &auth_path,
            r#"{"tokens":{"access_token":"  tok-123 ","account_id":"acct-9"}}"#,
        )
        .expect("write auth file");
        env.set(AUTH_FILE_ENV, &auth_path.to_string_lossy());

        let config = Config::load().expect("config should load");
        assert_eq!(config.api_key.as_deref(), Some("tok-123"));
        assert_eq!(config.account_id.as_deref(), Some("acct-9"));
    }

    #[test]
    fn test_env_key_wins_over_auth_file() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let env = ScrubbedEnv::new(ALL_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let auth_path = temp.path().join("auth.json");
        std::fs::write(&auth_path, r#"{"tokens":{"access_token":"file-token"}}"#)
            .expect("write auth file");
        env.set(AUTH_FILE_ENV, &auth_path.to_string_lossy());
        env.set(API_KEY_ENV, "env-token");

        let config = Config::load().expect("config should load");
        assert_eq!(config.api_key.as_deref(), Some("env-token"));
    }

    #[test]
    fn test_numeric_settings_are_clamped() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let env = ScrubbedEnv::new(ALL_KEYS);
        let temp = TempDir::new().expect("temp dir");
        env.set(AUTH_FILE_ENV, &temp.path().join("none.json").to_string_lossy());
        env.set(TIMEOUT_ENV, "5");
        env.set(MAX_TURNS_ENV, "1000");
        env.set(STREAM_ENV, "off");

        let config = Config::load().expect("config should load");
        assert_eq!(config.timeout_ms, 1_000);
        assert_eq!(config.max_turns, 32);
        assert!(!config.stream);
    }

    #[test]
    fn test_malformed_auth_file_is_ignored() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let env = ScrubbedEnv::new(ALL_KEYS);
        let temp = TempDir::new().expect("temp dir");
        let auth_path = temp.path().join("auth.json");
        std::fs::write(&auth_path, "{not json").expect("write auth file");
        env.set(AUTH_FILE_ENV, &auth_path.to_string_lossy());

        let config = Config::load().expect("config should load");
        assert!(config.api_key.is_none());
    }
}
