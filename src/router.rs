//! Router (C4): resolves an alias to a vendor and a routing mode, and owns
//! the lifecycle of whichever provider clients the configured keys allow it
//! to open.

use std::collections::HashMap;

use crate::config::Config;
use crate::providers::aggregator::AggregatorProvider;
use crate::providers::anthropic::AnthropicProvider;
use crate::providers::{ChatMessage, CompletionRequest, DispatchRequest, Provider};
use crate::transcript::{ModelResponse, RoutingDecision, RoutingMode};
use crate::vendor::{Vendor, VendorRegistry};

/// Routing policy for a single alias, as decided by [`ProviderRouter::route`].
/// `route` is a pure function of `(alias, config, registry)` — it performs no
/// I/O and opens nothing.
pub fn route(alias_or_id: &str, registry: &VendorRegistry, config: &Config) -> RoutingDecision {
    let vendor = registry.resolve_vendor(alias_or_id);
    let configured_mode = config
        .alias_mode(alias_or_id)
        .unwrap_or_else(|| config.default_mode());

    let has_key = vendor != Vendor::Aggregator && config.provider_key(vendor_provider_name(vendor)).is_some();
    let has_direct_impl = vendor_has_direct_impl(vendor);
    let can_go_direct = has_key && has_direct_impl;

    // `mode` records the *requested* mode, per the original's `RoutingDecision`
    // ("routing mode that was in effect"), even when a direct request falls
    // back to the aggregator for lack of a key or implementation —
    // `via_aggregator` is what carries the actual dispatch path.
    let mode = match configured_mode {
        "aggregator" => RoutingMode::Aggregator,
        "direct" => RoutingMode::Direct,
        _ => RoutingMode::Auto,
    };

    let via_aggregator = match mode {
        RoutingMode::Aggregator => true,
        RoutingMode::Direct => {
            if can_go_direct {
                false
            } else {
                if !has_key {
                    log::warn!("direct routing requested for '{alias_or_id}' but no API key is configured, falling back to aggregator");
                } else {
                    log::warn!("direct routing requested for '{alias_or_id}' but no provider implementation exists for {vendor:?}, falling back to aggregator");
                }
                true
            }
        }
        RoutingMode::Auto => !can_go_direct,
    };

    RoutingDecision {
        vendor,
        mode,
        via_aggregator,
    }
}

fn vendor_provider_name(vendor: Vendor) -> &'static str {
    match vendor {
        Vendor::Anthropic => "anthropic",
        Vendor::Openai => "openai",
        Vendor::Google => "google",
        Vendor::Xai => "xai",
        Vendor::Groq => "groq",
        Vendor::Local => "local",
        Vendor::Aggregator => "aggregator",
    }
}

/// Whether this core carries a direct client implementation for the vendor,
/// independent of whether a key is configured for it. Only Anthropic has one
/// today; every other vendor (even with a key) routes through the
/// aggregator.
fn vendor_has_direct_impl(vendor: Vendor) -> bool {
    matches!(vendor, Vendor::Anthropic)
}

/// Owns the provider clients opened for one debate's lifetime, and dispatches
/// each alias's completion request to the right one.
pub struct ProviderRouter {
    registry: VendorRegistry,
    config: Config,
    aggregator: Option<AggregatorProvider>,
    direct: HashMap<Vendor, Box<dyn Provider>>,
}

impl ProviderRouter {
    pub fn new(registry: VendorRegistry, config: Config) -> Self {
        ProviderRouter {
            registry,
            config,
            aggregator: None,
            direct: HashMap::new(),
        }
    }

    /// Opens the aggregator client if an aggregator key is configured, and
    /// opens a direct client for every vendor that both has a key and a
    /// known implementation. A key without an implementation (or vice versa)
    /// opens nothing for that vendor — `route` already accounts for this when
    /// deciding how to dispatch.
    pub async fn open(&mut self) {
        if let Some(key) = self.config.provider_key("aggregator") {
            let mut provider = AggregatorProvider::new(key.to_string());
            if provider.open().await.is_ok() {
                self.aggregator = Some(provider);
            }
        }
        if let Some(key) = self.config.provider_key("anthropic") {
            let mut provider = AnthropicProvider::new(key.to_string());
            if provider.open().await.is_ok() {
                self.direct.insert(Vendor::Anthropic, Box::new(provider));
            }
        }
    }

    pub async fn close(&mut self) {
        if let Some(provider) = &mut self.aggregator {
            provider.close().await;
        }
        self.aggregator = None;
        for provider in self.direct.values_mut() {
            provider.close().await;
        }
        self.direct.clear();
    }

    pub fn route(&self, alias_or_id: &str) -> RoutingDecision {
        route(alias_or_id, &self.registry, &self.config)
    }

    /// Resolve, route, and dispatch a single completion. Never fails: an
    /// unavailable provider (no key, no open client, routing decided
    /// aggregator but no aggregator key configured, etc) is reported as an
    /// error-bearing [`ModelResponse`] so the calling orchestrator's
    /// transcript stays structurally complete.
    pub async fn complete(
        &self,
        alias_or_id: &str,
        request: CompletionRequest,
        round_number: i32,
    ) -> ModelResponse {
        let decision = self.route(alias_or_id);

        let model_id = match self.registry.resolve_model_id(alias_or_id, !decision.via_aggregator) {
            Ok(id) => id,
            Err(_) => alias_or_id.to_string(),
        };

        let dispatch = DispatchRequest {
            model_id: model_id.clone(),
            request,
            alias: alias_or_id.to_string(),
            round_number,
        };

        let mut response = if decision.via_aggregator {
            match &self.aggregator {
                Some(provider) => provider.complete(dispatch).await,
                None => no_provider_response(alias_or_id, model_id, round_number),
            }
        } else {
            match self.direct.get(&decision.vendor) {
                Some(provider) => provider.complete(dispatch).await,
                None => no_provider_response(alias_or_id, model_id, round_number),
            }
        };

        response.routing = Some(decision);
        response
    }

    /// Fan out a full panel round in parallel, preserving panel order in the
    /// output `Vec`.
    pub async fn complete_panel(
        &self,
        requests: Vec<(String, CompletionRequest)>,
        round_number: i32,
    ) -> Vec<ModelResponse> {
        let futures = requests
            .into_iter()
            .map(|(alias, request)| self.complete(&alias, request, round_number));
        futures::future::join_all(futures).await
    }
}

fn no_provider_response(alias: &str, model_id: String, round_number: i32) -> ModelResponse {
    ModelResponse {
        model_id,
        model_alias: alias.to_string(),
        round_number,
        content: String::new(),
        timestamp: chrono::Utc::now(),
        token_count: None,
        input_tokens: None,
        output_tokens: None,
        latency_ms: None,
        error: Some(format!("No provider available for '{alias}'")),
        role: Default::default(),
        routing: None,
        analysis: Default::default(),
    }
}

#[allow(dead_code)]
fn prompt_request(prompt: impl Into<String>) -> CompletionRequest {
    CompletionRequest::Prompt(prompt.into())
}

#[allow(dead_code)]
fn messages_request(messages: Vec<ChatMessage>) -> CompletionRequest {
    CompletionRequest::Messages(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(openrouter_key: &str, anthropic_key: &str, routing: &[(&str, &str)]) -> Config {
        let mut config = Config::default();
        config.providers.clear();
        if !openrouter_key.is_empty() {
            config.providers.insert("aggregator".to_string(), openrouter_key.to_string());
        }
        if !anthropic_key.is_empty() {
            config.providers.insert("anthropic".to_string(), anthropic_key.to_string());
        }
        config.routing.clear();
        for (k, v) in routing {
            config.routing.insert((*k).to_string(), (*v).to_string());
        }
        config
    }

    #[test]
    fn resolve_vendor_alias_takes_priority_over_slash_parse() {
        let registry = VendorRegistry::with_defaults();
        assert_eq!(registry.resolve_vendor("claude"), Vendor::Anthropic);
    }

    #[test]
    fn aggregator_mode_always_routes_via_aggregator() {
        let registry = VendorRegistry::with_defaults();
        let config = config_with("sk-or-test", "sk-ant-test", &[("default_mode", "aggregator")]);
        let decision = route("claude", &registry, &config);
        assert!(decision.via_aggregator);
        assert_eq!(decision.mode, RoutingMode::Aggregator);
        assert_eq!(decision.vendor, Vendor::Anthropic);
    }

    #[test]
    fn direct_mode_with_key_and_provider_routes_direct() {
        let registry = VendorRegistry::with_defaults();
        let config = config_with("", "sk-ant-test", &[("default_mode", "direct")]);
        let decision = route("claude", &registry, &config);
        assert!(!decision.via_aggregator);
        assert_eq!(decision.mode, RoutingMode::Direct);
    }

    #[test]
    fn direct_mode_without_key_falls_back_to_aggregator_but_mode_stays_direct() {
        let registry = VendorRegistry::with_defaults();
        let config = config_with("", "", &[("default_mode", "direct")]);
        let decision = route("claude", &registry, &config);
        assert!(decision.via_aggregator);
        assert_eq!(decision.mode, RoutingMode::Direct);
    }

    #[test]
    fn direct_mode_with_only_aggregator_key_falls_back_but_reports_direct_mode() {
        // §8 end-to-end scenario 5: default_mode=direct, aliases={claude→anthropic},
        // keys={aggregator only}. The dispatched call goes through the
        // aggregator, but the routing decision still records the requested
        // mode as `direct`.
        let registry = VendorRegistry::with_defaults();
        let config = config_with("sk-or-test", "", &[("default_mode", "direct")]);
        let decision = route("claude", &registry, &config);
        assert_eq!(decision.vendor, Vendor::Anthropic);
        assert_eq!(decision.mode, RoutingMode::Direct);
        assert!(decision.via_aggregator);
    }

    #[test]
    fn direct_mode_without_provider_impl_falls_back() {
        let registry = VendorRegistry::with_defaults();
        let mut config = config_with("", "", &[("default_mode", "direct")]);
        config.providers.insert("openai".to_string(), "sk-openai-test".to_string());
        let decision = route("gpt", &registry, &config);
        assert!(decision.via_aggregator);
    }

    #[test]
    fn auto_mode_with_key_and_provider_routes_direct() {
        let registry = VendorRegistry::with_defaults();
        let config = config_with("", "sk-ant-test", &[("default_mode", "auto")]);
        let decision = route("claude", &registry, &config);
        assert!(!decision.via_aggregator);
    }

    #[test]
    fn auto_mode_without_key_falls_back() {
        let registry = VendorRegistry::with_defaults();
        let config = config_with("", "", &[("default_mode", "auto")]);
        let decision = route("claude", &registry, &config);
        assert!(decision.via_aggregator);
    }

    #[test]
    fn per_alias_override_does_not_affect_other_aliases() {
        let registry = VendorRegistry::with_defaults();
        let config = config_with(
            "sk-or-test",
            "sk-ant-test",
            &[("default_mode", "aggregator"), ("claude", "direct")],
        );
        let claude_decision = route("claude", &registry, &config);
        assert!(!claude_decision.via_aggregator);
        let gpt_decision = route("gpt", &registry, &config);
        assert!(gpt_decision.via_aggregator);
    }

    #[tokio::test]
    async fn complete_with_no_providers_open_returns_error_response_not_panic() {
        let registry = VendorRegistry::with_defaults();
        let config = config_with("", "", &[("default_mode", "auto")]);
        let router = ProviderRouter::new(registry, config);
        let response = router
            .complete("claude", CompletionRequest::Prompt("hi".to_string()), 0)
            .await;
        assert!(response.is_error());
        assert_eq!(response.content, "");
        assert_eq!(response.model_alias, "claude");
    }
}
