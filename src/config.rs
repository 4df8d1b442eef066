//! Configuration surface (C11) presented to callers.
//!
//! Parsing an actual config *file* is out of scope for this core — the
//! embedding program supplies a [`Config`] however it likes (TOML, JSON,
//! environment, hardcoded defaults in a test). `Config` derives
//! `Serialize`/`Deserialize` with `#[serde(default)]` fields purely so an
//! embedder *may* round-trip it through a file format without this crate
//! parsing anything itself.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vendor::{AliasIds, Vendor, VendorRegistry};

pub const MAX_ROUNDS: u32 = 3;
const DEFAULT_ROUNDS: u32 = 1;

fn default_routing() -> HashMap<String, String> {
    let mut routing = HashMap::new();
    routing.insert("default_mode".to_string(), "auto".to_string());
    routing
}

fn default_panel() -> Vec<String> {
    vec![
        "claude".to_string(),
        "gpt".to_string(),
        "gemini".to_string(),
        "grok".to_string(),
    ]
}

fn default_synthesizer() -> String {
    "claude".to_string()
}

fn default_rounds() -> u32 {
    DEFAULT_ROUNDS
}

fn default_model_aliases() -> HashMap<String, AliasIds> {
    let mut aliases = HashMap::new();
    aliases.insert(
        "claude".to_string(),
        AliasIds {
            aggregator_id: "anthropic/claude-sonnet-4.5".to_string(),
            direct_id: Some("claude-sonnet-4-5-20250929".to_string()),
        },
    );
    aliases.insert(
        "gpt".to_string(),
        AliasIds {
            aggregator_id: "openai/gpt-5.2".to_string(),
            direct_id: None,
        },
    );
    aliases.insert(
        "gemini".to_string(),
        AliasIds {
            aggregator_id: "google/gemini-2.5-pro".to_string(),
            direct_id: None,
        },
    );
    aliases.insert(
        "grok".to_string(),
        AliasIds {
            aggregator_id: "x-ai/grok-4".to_string(),
            direct_id: None,
        },
    );
    aliases
}

/// Application configuration, supplied by the embedder.
///
/// `providers` maps a provider name (`"aggregator"`, `"anthropic"`,
/// `"openai"`, `"google"`, `"xai"`, `"groq"`) to its API key. `routing` maps
/// either `"default_mode"` or a specific alias to one of `"auto"`,
/// `"direct"`, `"aggregator"`. `model_aliases` maps an alias to its
/// aggregator/direct model IDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, String>,
    #[serde(default = "default_routing")]
    pub routing: HashMap<String, String>,
    #[serde(default = "default_model_aliases")]
    pub model_aliases: HashMap<String, AliasIds>,
    #[serde(default = "default_panel")]
    pub default_panel: Vec<String>,
    #[serde(default = "default_synthesizer")]
    pub default_synthesizer: String,
    #[serde(default = "default_rounds")]
    pub default_rounds: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            providers: HashMap::new(),
            routing: default_routing(),
            model_aliases: default_model_aliases(),
            default_panel: default_panel(),
            default_synthesizer: default_synthesizer(),
            default_rounds: default_rounds(),
        }
    }
}

impl Config {
    /// Overlay provider keys from the documented environment variables onto
    /// `providers`, for any variable that is set and non-empty. Existing
    /// explicit `providers` entries are overwritten — env vars are treated
    /// as the freshest source, matching the original tool's precedence.
    pub fn apply_env_overrides(&mut self) {
        const ENV_VARS: &[(&str, &str)] = &[
            ("OPENROUTER_API_KEY", "aggregator"),
            ("ANTHROPIC_API_KEY", "anthropic"),
            ("OPENAI_API_KEY", "openai"),
            ("GOOGLE_API_KEY", "google"),
            ("XAI_API_KEY", "xai"),
            ("GROQ_API_KEY", "groq"),
        ];
        for (env_var, provider) in ENV_VARS {
            if let Ok(value) = std::env::var(env_var) {
                if !value.is_empty() {
                    self.providers.insert((*provider).to_string(), value);
                }
            }
        }
    }

    pub fn provider_key(&self, provider: &str) -> Option<&str> {
        self.providers
            .get(provider)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Per-alias routing mode override, if any.
    pub fn alias_mode(&self, alias: &str) -> Option<&str> {
        self.routing.get(alias).map(|s| s.as_str())
    }

    /// The configured default routing mode, defaulting to `"auto"` if the
    /// map is missing the key entirely (shouldn't happen given `Default`,
    /// but a manually constructed `Config` could omit it).
    pub fn default_mode(&self) -> &str {
        self.routing
            .get("default_mode")
            .map(|s| s.as_str())
            .unwrap_or("auto")
    }

    /// Build a [`VendorRegistry`] from `model_aliases`, inferring each
    /// alias's vendor from its registered aggregator ID's prefix.
    pub fn build_registry(&self) -> VendorRegistry {
        let mut registry = VendorRegistry::new();
        for (alias, ids) in &self.model_aliases {
            let vendor = infer_vendor(ids);
            registry.register(alias.clone(), vendor, ids.clone());
        }
        registry
    }
}

fn infer_vendor(ids: &AliasIds) -> Vendor {
    match ids.aggregator_id.split_once('/') {
        Some(("anthropic", _)) => Vendor::Anthropic,
        Some(("openai", _)) => Vendor::Openai,
        Some(("google", _)) => Vendor::Google,
        Some(("x-ai", _)) => Vendor::Xai,
        Some(("groq", _)) => Vendor::Groq,
        Some(("ollama", _)) => Vendor::Local,
        _ => Vendor::Aggregator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_seeds_four_starter_aliases() {
        let config = Config::default();
        assert_eq!(config.model_aliases.len(), 4);
        assert_eq!(config.default_mode(), "auto");
        assert_eq!(config.default_rounds, 1);
    }

    #[test]
    fn env_overrides_only_apply_nonempty_vars() {
        std::env::remove_var("XAI_API_KEY");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert!(config.provider_key("xai").is_none());
    }

    #[test]
    fn build_registry_infers_vendor_from_aggregator_id_prefix() {
        let config = Config::default();
        let registry = config.build_registry();
        assert_eq!(registry.resolve_vendor("claude"), Vendor::Anthropic);
        assert_eq!(registry.resolve_vendor("gemini"), Vendor::Google);
    }
}
