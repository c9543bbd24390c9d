//! Configuration system (layered: code > env > dotenv file).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::ParleyError;

/// Global default config (lazy-initialized from env).
static DEFAULT_CONFIG: OnceLock<ParleyConfig> = OnceLock::new();

const API_KEY_VARS: [(&str, &str); 5] = [
    ("ANTHROPIC_API_KEY", "anthropic"),
    ("OPENAI_API_KEY", "openai"),
    ("GROQ_API_KEY", "groq"),
    ("AZURE_OPENAI_API_KEY", "azure"),
    ("AMAZON_ACCESS_KEY", "bedrock"),
];

const BASE_URL_VARS: [(&str, &str); 3] = [
    ("ANTHROPIC_BASE_URL", "anthropic"),
    ("OPENAI_BASE_URL", "openai"),
    ("GROQ_BASE_URL", "groq"),
];

const SETTING_VARS: [(&str, &str); 5] = [
    ("AZURE_OPENAI_RESOURCE", "azure.resource"),
    ("AZURE_OPENAI_DEPLOYMENT", "azure.deployment"),
    ("AZURE_OPENAI_API_VERSION", "azure.api_version"),
    ("AMAZON_SECRET_ACCESS_KEY", "bedrock.secret_access_key"),
    ("AMAZON_REGION", "bedrock.region"),
];

/// Provider credentials and endpoint overrides.
///
/// Cloning is cheap and clones share the same underlying maps.
#[derive(Debug, Clone, Default)]
pub struct ParleyConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
    settings: Arc<RwLock<HashMap<String, String>>>,
}

impl ParleyConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (ANTHROPIC_API_KEY, OPENAI_API_KEY, etc.).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let config = Self::new();
        config.apply(|name| std::env::var(name).ok());
        config
    }

    /// Load from a specific dotenv file without touching the process environment.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ParleyError> {
        let path = path.as_ref();
        let entries = dotenvy::from_path_iter(path).map_err(|e| {
            ParleyError::Configuration(format!("Cannot read {}: {e}", path.display()))
        })?;

        let mut vars = HashMap::new();
        for entry in entries {
            let (key, value) = entry.map_err(|e| {
                ParleyError::Configuration(format!("Malformed entry in {}: {e}", path.display()))
            })?;
            vars.insert(key, value);
        }

        let config = Self::new();
        config.apply(|name| vars.get(name).cloned());
        Ok(config)
    }

    /// Get (or create) the global default config.
    pub fn global() -> &'static ParleyConfig {
        DEFAULT_CONFIG.get_or_init(Self::from_env)
    }

    fn apply(&self, lookup: impl Fn(&str) -> Option<String>) {
        for (var, provider) in API_KEY_VARS {
            if let Some(key) = lookup(var).filter(|v| !v.is_empty()) {
                self.set_api_key(provider, key);
            }
        }
        for (var, provider) in BASE_URL_VARS {
            if let Some(url) = lookup(var).filter(|v| !v.is_empty()) {
                self.set_base_url(provider, url);
            }
        }
        for (var, name) in SETTING_VARS {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                self.set_setting(name, value);
            }
        }
    }

    pub fn set_api_key(&self, provider: &str, key: String) {
        write_entry(&self.api_keys, provider, key);
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        read_entry(&self.api_keys, provider)
    }

    pub fn set_base_url(&self, provider: &str, url: String) {
        write_entry(&self.base_urls, provider, url);
    }

    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        read_entry(&self.base_urls, provider)
    }

    /// Free-form provider setting, e.g. `azure.resource`.
    pub fn set_setting(&self, name: &str, value: String) {
        write_entry(&self.settings, name, value);
    }

    pub fn get_setting(&self, name: &str) -> Option<String> {
        read_entry(&self.settings, name)
    }

    pub fn has_credentials(&self, provider: &str) -> bool {
        self.get_api_key(provider).is_some()
    }

    /// Azure deployment described by the `azure.*` settings, if complete.
    #[cfg(feature = "azure")]
    pub fn azure_deployment(&self) -> Option<crate::models::azure::AzureDeployment> {
        let resource = self.get_setting("azure.resource")?;
        let deployment = self.get_setting("azure.deployment")?;
        let mut descriptor = crate::models::azure::AzureDeployment::new(resource, deployment);
        if let Some(version) = self.get_setting("azure.api_version") {
            descriptor = descriptor.with_api_version(version);
        }
        Some(descriptor)
    }
}

fn write_entry(map: &RwLock<HashMap<String, String>>, key: &str, value: String) {
    let mut guard = map.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.insert(key.to_string(), value);
}

fn read_entry(map: &RwLock<HashMap<String, String>>, key: &str) -> Option<String> {
    let guard = map.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.get(key).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn explicit_keys_are_shared_between_clones() {
        let config = ParleyConfig::new();
        let clone = config.clone();
        clone.set_api_key("openai", "sk-test".to_string());

        assert_eq!(config.get_api_key("openai"), Some("sk-test".to_string()));
        assert!(config.has_credentials("openai"));
        assert!(!config.has_credentials("anthropic"));
    }

    #[test]
    fn from_env_file_maps_known_variables() {
        let file = env_file(
            "ANTHROPIC_API_KEY=ant-key\nGROQ_BASE_URL=http://localhost:9999\nUNRELATED=1\n",
        );
        let config = ParleyConfig::from_env_file(file.path()).unwrap();

        assert_eq!(config.get_api_key("anthropic"), Some("ant-key".to_string()));
        assert_eq!(
            config.get_base_url("groq"),
            Some("http://localhost:9999".to_string())
        );
        assert_eq!(config.get_api_key("openai"), None);
    }

    #[test]
    fn empty_values_are_ignored() {
        let file = env_file("OPENAI_API_KEY=\n");
        let config = ParleyConfig::from_env_file(file.path()).unwrap();

        assert_eq!(config.get_api_key("openai"), None);
    }

    #[test]
    fn missing_env_file_is_a_configuration_error() {
        let err = ParleyConfig::from_env_file("/definitely/not/here/.env").unwrap_err();
        assert!(matches!(err, ParleyError::Configuration(_)));
    }

    #[cfg(feature = "azure")]
    #[test]
    fn azure_deployment_requires_resource_and_deployment() {
        let file = env_file(
            "AZURE_OPENAI_RESOURCE=france\nAZURE_OPENAI_DEPLOYMENT=gpt4\nAZURE_OPENAI_API_VERSION=2024-06-01\n",
        );
        let config = ParleyConfig::from_env_file(file.path()).unwrap();
        let deployment = config.azure_deployment().unwrap();

        assert_eq!(deployment.identifier(), "azure_france_gpt4");
        assert_eq!(deployment.api_version, "2024-06-01");
        assert!(ParleyConfig::new().azure_deployment().is_none());
    }
}
