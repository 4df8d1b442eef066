//! Vendor registry (C1): static mapping of aliases to vendor identity and
//! to aggregator / direct model IDs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The closed set of vendors the core knows about. Each has at most one
/// direct provider client implementation; `Aggregator` always has one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Anthropic,
    Openai,
    Google,
    Xai,
    Groq,
    Aggregator,
    Local,
}

impl Vendor {
    fn from_prefix(prefix: &str) -> Vendor {
        match prefix {
            "anthropic" => Vendor::Anthropic,
            "openai" => Vendor::Openai,
            "google" => Vendor::Google,
            "x-ai" => Vendor::Xai,
            "groq" => Vendor::Groq,
            "ollama" => Vendor::Local,
            _ => Vendor::Aggregator,
        }
    }
}

/// The two concrete model IDs an alias may resolve to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AliasIds {
    pub aggregator_id: String,
    pub direct_id: Option<String>,
}

/// A registered alias: its vendor plus its concrete model IDs.
#[derive(Debug, Clone)]
struct AliasEntry {
    vendor: Vendor,
    ids: AliasIds,
}

/// Process-wide (in practice, per-`Config`), read-mostly alias table.
///
/// Constructed once at orchestrator entry from [`crate::config::Config`] and
/// owned by it for the lifetime of a debate — no process singleton is
/// required for correctness, per the "replaces global mutable state" design
/// note.
#[derive(Debug, Clone, Default)]
pub struct VendorRegistry {
    aliases: HashMap<String, AliasEntry>,
}

impl VendorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an alias with its vendor and model IDs, overwriting any
    /// prior registration for the same alias.
    pub fn register(&mut self, alias: impl Into<String>, vendor: Vendor, ids: AliasIds) {
        self.aliases.insert(alias.into(), AliasEntry { vendor, ids });
    }

    /// `resolveVendor(aliasOrID)`. The alias table wins even if the alias
    /// string itself happens to contain a slash.
    pub fn resolve_vendor(&self, alias_or_id: &str) -> Vendor {
        if let Some(entry) = self.aliases.get(alias_or_id) {
            return entry.vendor;
        }
        match alias_or_id.split_once('/') {
            Some((prefix, _)) => Vendor::from_prefix(prefix),
            None => Vendor::Aggregator,
        }
    }

    /// `resolveModelID(aliasOrID, direct?)`. Fully-qualified (`/`-containing)
    /// strings are returned unchanged. Unknown bare aliases fail with
    /// `UnknownAlias`.
    pub fn resolve_model_id(&self, alias_or_id: &str, direct: bool) -> Result<String, CoreError> {
        if let Some(entry) = self.aliases.get(alias_or_id) {
            if direct {
                return Ok(entry
                    .ids
                    .direct_id
                    .clone()
                    .unwrap_or_else(|| entry.ids.aggregator_id.clone()));
            }
            return Ok(entry.ids.aggregator_id.clone());
        }
        if alias_or_id.contains('/') {
            return Ok(alias_or_id.to_string());
        }
        Err(CoreError::UnknownAlias(alias_or_id.to_string()))
    }

    /// Whether a direct model ID is registered for this alias (and the
    /// vendor is not `Aggregator` itself — the aggregator has no "direct"
    /// distinct from itself).
    pub fn has_direct(&self, alias: &str) -> bool {
        self.aliases
            .get(alias)
            .map(|e| e.ids.direct_id.is_some())
            .unwrap_or(false)
    }

    /// Iterate `(direct_id, aggregator_id)` pairs for every alias that has
    /// both — used by the pricing cache to build its one-level-deep
    /// direct-to-aggregator mapping.
    pub fn direct_to_aggregator_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.values().filter_map(|entry| {
            entry
                .ids
                .direct_id
                .as_deref()
                .map(|direct| (direct, entry.ids.aggregator_id.as_str()))
        })
    }

    /// The default alias table seeded by the original tool: four starter
    /// aliases, each mapped to an aggregator ID, two of them (`claude`) also
    /// carrying a direct ID since Anthropic is the only vendor besides the
    /// aggregator with a direct provider client implementation.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            "claude",
            Vendor::Anthropic,
            AliasIds {
                aggregator_id: "anthropic/claude-sonnet-4.5".to_string(),
                direct_id: Some("claude-sonnet-4-5-20250929".to_string()),
            },
        );
        registry.register(
            "gpt",
            Vendor::Openai,
            AliasIds {
                aggregator_id: "openai/gpt-5.2".to_string(),
                direct_id: None,
            },
        );
        registry.register(
            "gemini",
            Vendor::Google,
            AliasIds {
                aggregator_id: "google/gemini-2.5-pro".to_string(),
                direct_id: None,
            },
        );
        registry.register(
            "grok",
            Vendor::Xai,
            AliasIds {
                aggregator_id: "x-ai/grok-4".to_string(),
                direct_id: None,
            },
        );
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_resolves_to_registered_vendor() {
        let registry = VendorRegistry::with_defaults();
        assert_eq!(registry.resolve_vendor("claude"), Vendor::Anthropic);
        assert_eq!(registry.resolve_vendor("gpt"), Vendor::Openai);
        assert_eq!(registry.resolve_vendor("gemini"), Vendor::Google);
        assert_eq!(registry.resolve_vendor("grok"), Vendor::Xai);
    }

    #[test]
    fn full_model_id_resolves_by_prefix() {
        let registry = VendorRegistry::with_defaults();
        assert_eq!(
            registry.resolve_vendor("anthropic/claude-sonnet-4.5"),
            Vendor::Anthropic
        );
        assert_eq!(registry.resolve_vendor("openai/gpt-5.2"), Vendor::Openai);
        assert_eq!(
            registry.resolve_vendor("google/gemini-2.5-pro"),
            Vendor::Google
        );
        assert_eq!(registry.resolve_vendor("x-ai/grok-4"), Vendor::Xai);
    }

    #[test]
    fn unknown_prefix_defaults_to_aggregator() {
        let registry = VendorRegistry::with_defaults();
        assert_eq!(
            registry.resolve_vendor("unknown-vendor/some-model"),
            Vendor::Aggregator
        );
        assert_eq!(registry.resolve_vendor("totally-unknown"), Vendor::Aggregator);
    }

    #[test]
    fn alias_table_wins_over_slash_parsing() {
        let mut registry = VendorRegistry::new();
        registry.register(
            "weird/alias",
            Vendor::Anthropic,
            AliasIds {
                aggregator_id: "anthropic/whatever".to_string(),
                direct_id: None,
            },
        );
        assert_eq!(registry.resolve_vendor("weird/alias"), Vendor::Anthropic);
    }

    #[test]
    fn resolve_model_id_falls_back_to_aggregator_without_direct() {
        let registry = VendorRegistry::with_defaults();
        assert_eq!(
            registry.resolve_model_id("gpt", true).unwrap(),
            "openai/gpt-5.2"
        );
    }

    #[test]
    fn resolve_model_id_returns_direct_when_present() {
        let registry = VendorRegistry::with_defaults();
        assert_eq!(
            registry.resolve_model_id("claude", true).unwrap(),
            "claude-sonnet-4-5-20250929"
        );
        assert_eq!(
            registry.resolve_model_id("claude", false).unwrap(),
            "anthropic/claude-sonnet-4.5"
        );
    }

    #[test]
    fn resolve_model_id_passes_through_qualified_ids() {
        let registry = VendorRegistry::with_defaults();
        assert_eq!(
            registry.resolve_model_id("mistral/mixtral-8x7b", false).unwrap(),
            "mistral/mixtral-8x7b"
        );
    }

    #[test]
    fn resolve_model_id_fails_on_unknown_bare_alias() {
        let registry = VendorRegistry::with_defaults();
        assert!(matches!(
            registry.resolve_model_id("nope", false),
            Err(CoreError::UnknownAlias(_))
        ));
    }
}
