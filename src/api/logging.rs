use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

use crate::util::parse_bool_str;

const DEFAULT_API_LOG_PATH: &str = "/tmp/voxroute-debug-payload.log";
const DEBUG_PAYLOAD_ENV: &str = "VOX_DEBUG_PAYLOAD";
const API_LOG_PATH_ENV: &str = "VOX_API_LOG_PATH";

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(|v| parse_bool_str(&v))
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, sequence: usize, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message = format!(
        "VOX_API DEBUG payload_request url={request_url} request={sequence}\npayload:\n{formatted_payload}\n"
    );

    if let Some(path) = resolve_log_path() {
        match append_log_file(&path, &message) {
            Ok(()) => return,
            Err(error) => tracing::debug!(path = %path, %error, "cannot append payload log"),
        }
    }
    tracing::debug!(target: "voxroute::payload", "{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(API_LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            std::io::stderr()
                .is_terminal()
                .then(|| DEFAULT_API_LOG_PATH.to_string())
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScrubbedEnv, ENV_LOCK};
    use serde_json::json;

    #[test]
    fn test_debug_payload_enabled_accepts_flag_variants() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let env = ScrubbedEnv::new(&[DEBUG_PAYLOAD_ENV]);
        assert!(!debug_payload_enabled());
        env.set(DEBUG_PAYLOAD_ENV, "1");
        assert!(debug_payload_enabled());
        env.set(DEBUG_PAYLOAD_ENV, "TRUE");
        assert!(debug_payload_enabled());
        env.set(DEBUG_PAYLOAD_ENV, "nah");
        assert!(!debug_payload_enabled());
    }

    #[test]
    fn test_payload_is_appended_to_configured_path() {
        let _env_lock = ENV_LOCK.blocking_lock();
        let env = ScrubbedEnv::new(&[API_LOG_PATH_ENV]);
        let temp = tempfile::TempDir::new().expect("temp dir");
        let log_path = temp.path().join("payload.log");
        env.set(API_LOG_PATH_ENV, &log_path.to_string_lossy());

        emit_debug_payload("http://localhost/responses", 2, &json!({"model": "m"}));
        emit_debug_payload("http://localhost/responses", 3, &json!({"model": "m"}));

        let written = std::fs::read_to_string(&log_path).expect("log written");
        assert!(written.contains("request=2"));
        assert!(written.contains("request=3"));
        assert!(written.contains("\"model\": \"m\""));
    }
}
