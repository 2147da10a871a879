use tokio::sync::Mutex as AsyncMutex;

/// Serializes tests that touch `VOX_*` environment variables.
/// Sync tests take it with `.blocking_lock()`, async tests with `.lock().await`.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Removes the listed variables on creation and again on drop so one test's
/// configuration never leaks into the next.
pub struct ScrubbedEnv {
    keys: Vec<&'static str>,
}

impl ScrubbedEnv {
    pub fn new(keys: &[&'static str]) -> Self {
        for key in keys {
            std::env::remove_var(key);
        }
        Self {
            keys: keys.to_vec(),
        }
    }

    pub fn set(&self, key: &'static str, value: &str) {
        debug_assert!(self.keys.contains(&key), "{key} is not scrubbed");
        std::env::set_var(key, value);
    }
}

impl Drop for ScrubbedEnv {
    fn drop(&mut self) {
        for key in &self.keys {
            std::env::remove_var(key);
        }
    }
}
