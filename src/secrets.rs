//! Secret resolution boundary.
//!
//! Providers name an environment variable; the orchestrator resolves it
//! through this trait just before dispatch. A missing required secret fails
//! that provider immediately, with no network call.

use std::collections::HashMap;

/// Looks up provider secrets by environment variable name.
pub trait SecretResolver: Send + Sync {
    /// Returns the secret value, or `None` if unset or empty.
    fn lookup(&self, env_var: &str) -> Option<String>;
}

/// Production resolver backed by the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretResolver for EnvSecrets {
    fn lookup(&self, env_var: &str) -> Option<String> {
        std::env::var(env_var).ok().filter(|v| !v.is_empty())
    }
}

/// Map-backed resolver for tests and embedded use.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new(values: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl SecretResolver for StaticSecrets {
    fn lookup(&self, env_var: &str) -> Option<String> {
        self.values.get(env_var).filter(|v| !v.is_empty()).cloned()
    }
}
