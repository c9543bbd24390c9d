//! Tests for configuration system.

use std::sync::{Mutex, OnceLock};

use parley::config::ParleyConfig;
use parley::error::ParleyError;
use parley::models::LanguageModel;
use parley::provider::create_adapter;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 13] = [
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "GROQ_API_KEY",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_RESOURCE",
    "AZURE_OPENAI_DEPLOYMENT",
    "AZURE_OPENAI_API_VERSION",
    "ANTHROPIC_BASE_URL",
    "OPENAI_BASE_URL",
    "GROQ_BASE_URL",
    "AMAZON_ACCESS_KEY",
    "AMAZON_SECRET_ACCESS_KEY",
    "AMAZON_REGION",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn config_set_get_base_url() {
    let config = ParleyConfig::new();
    config.set_base_url("openai", "http://localhost:8080".to_string());
    assert_eq!(
        config.get_base_url("openai"),
        Some("http://localhost:8080".to_string())
    );
    assert_eq!(config.get_base_url("anthropic"), None);
}

#[test]
fn config_from_env_maps_api_keys_and_base_urls() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }

    std::env::set_var("OPENAI_API_KEY", "test-openai-key");
    std::env::set_var("ANTHROPIC_API_KEY", "test-anthropic-key");
    std::env::set_var("GROQ_BASE_URL", "http://localhost:9999/v1");
    std::env::set_var("AZURE_OPENAI_RESOURCE", "france");

    let config = ParleyConfig::from_env();

    assert_eq!(
        config.get_api_key("openai"),
        Some("test-openai-key".to_string())
    );
    assert_eq!(
        config.get_api_key("anthropic"),
        Some("test-anthropic-key".to_string())
    );
    assert_eq!(
        config.get_base_url("groq"),
        Some("http://localhost:9999/v1".to_string())
    );
    assert_eq!(config.get_setting("azure.resource"), Some("france".to_string()));
}

#[test]
fn config_from_env_maps_bedrock_credentials() {
    let _env_lock = env_lock_guard();
    let _env_guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }

    std::env::set_var("AMAZON_ACCESS_KEY", "AKIATEST");
    std::env::set_var("AMAZON_SECRET_ACCESS_KEY", "secret");
    std::env::set_var("AMAZON_REGION", "eu-west-1");

    let config = ParleyConfig::from_env();

    assert_eq!(config.get_api_key("bedrock"), Some("AKIATEST".to_string()));
    assert_eq!(
        config.get_setting("bedrock.secret_access_key"),
        Some("secret".to_string())
    );
    assert_eq!(config.get_setting("bedrock.region"), Some("eu-west-1".to_string()));
}

#[cfg(feature = "azure")]
#[test]
fn azure_env_settings_reach_the_adapter() {
    use parley::models::ModelSelector;

    let file = {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "AZURE_OPENAI_API_KEY=az-key").unwrap();
        writeln!(file, "AZURE_OPENAI_RESOURCE=france").unwrap();
        writeln!(file, "AZURE_OPENAI_DEPLOYMENT=gpt4").unwrap();
        writeln!(file, "AZURE_OPENAI_API_VERSION=2024-06-01").unwrap();
        file
    };
    let config = ParleyConfig::from_env_file(file.path()).unwrap();

    let model = ModelSelector::parse_with_config("azure:", &config).unwrap();
    assert_eq!(model.to_string(), "azure:azure_france_gpt4");
    let adapter = create_adapter(&model, &config).unwrap();
    assert_eq!(adapter.identifier(), "azure_france_gpt4");
}

#[cfg(feature = "openai")]
#[test]
fn create_adapter_requires_a_key() {
    let model: LanguageModel = "openai:gpt-4o".parse().unwrap();
    let config = ParleyConfig::new();

    let err = create_adapter(&model, &config).err().unwrap();
    assert!(matches!(err, ParleyError::Authentication(ref msg) if msg == "Missing OPENAI_API_KEY"));

    config.set_api_key("openai", "sk-test".to_string());
    assert!(create_adapter(&model, &config).is_ok());
}

#[cfg(feature = "anthropic")]
#[test]
fn env_file_credentials_build_an_adapter() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# local credentials").unwrap();
    writeln!(file, "ANTHROPIC_API_KEY=\"ant-from-file\"").unwrap();
    writeln!(file, "ANTHROPIC_BASE_URL=http://127.0.0.1:1/v1").unwrap();

    let config = ParleyConfig::from_env_file(file.path()).unwrap();
    assert_eq!(config.get_api_key("anthropic"), Some("ant-from-file".to_string()));

    let model: LanguageModel = "anthropic:claude-3-5-sonnet-20240620".parse().unwrap();
    let adapter = create_adapter(&model, &config).unwrap();
    assert_eq!(adapter.identifier(), "claude-3-5-sonnet-20240620");
}
