//! Pricing cache (C2): one-shot fetch + in-memory cache of per-token prices
//! and context windows from the aggregator's public models catalog.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::transcript::ModelResponse;
use crate::vendor::VendorRegistry;

const MODELS_URL: &str = "https://openrouter.ai/api/v1/models";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-token pricing and context metadata for a model.
#[derive(Debug, Clone)]
pub struct ModelPricing {
    pub prompt_price: f64,
    pub completion_price: f64,
    pub context_length: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: Option<String>,
    pricing: Option<PricingEntry>,
    context_length: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PricingEntry {
    prompt: Option<String>,
    completion: Option<String>,
}

/// Session-scoped cache for model pricing. No API key is required — the
/// aggregator's models endpoint is public.
///
/// Supports both aggregator model IDs and vendor-native ("direct") model
/// IDs by mapping through the vendor registry's direct→aggregator
/// association, one level deep (never recursive — see the Open Questions
/// decision in the design notes).
pub struct PricingCache {
    cache: Option<HashMap<String, ModelPricing>>,
    direct_to_aggregator: HashMap<String, String>,
}

impl PricingCache {
    pub fn new(registry: &VendorRegistry) -> Self {
        let direct_to_aggregator = registry
            .direct_to_aggregator_pairs()
            .map(|(direct, aggregator)| (direct.to_string(), aggregator.to_string()))
            .collect();
        PricingCache {
            cache: None,
            direct_to_aggregator,
        }
    }

    /// Idempotent: issues a single GET to the aggregator's public models
    /// catalog. Subsequent calls are no-ops.
    pub async fn prefetch(&mut self) {
        if self.cache.is_none() {
            self.fetch_all().await;
        }
    }

    /// Looks up by exact ID first; if a direct (vendor-native) ID is
    /// supplied, resolves it through the direct→aggregator mapping before
    /// the secondary lookup.
    pub async fn get_pricing(&mut self, model_id: &str) -> Option<ModelPricing> {
        if self.cache.is_none() {
            self.fetch_all().await;
        }
        let cache = self.cache.as_ref()?;
        if let Some(pricing) = cache.get(model_id) {
            return Some(pricing.clone());
        }
        let aggregator_id = self.direct_to_aggregator.get(model_id)?;
        cache.get(aggregator_id).cloned()
    }

    /// Test-only seam: install a pre-fetched price table directly, bypassing
    /// the network fetch. Used by other modules' tests that need priced
    /// responses without reaching the aggregator's catalog endpoint.
    #[cfg(test)]
    pub(crate) fn seed(&mut self, prices: HashMap<String, ModelPricing>) {
        self.cache = Some(prices);
    }

    async fn fetch_all(&mut self) {
        let client = match reqwest::Client::builder().timeout(FETCH_TIMEOUT).build() {
            Ok(client) => client,
            Err(err) => {
                log::warn!("failed to build pricing HTTP client: {err}. Cost tracking unavailable.");
                self.cache = Some(HashMap::new());
                return;
            }
        };

        let response = match client.get(MODELS_URL).send().await {
            Ok(response) => response,
            Err(err) => {
                log::warn!("failed to fetch model pricing: {err}. Cost tracking unavailable.");
                self.cache = Some(HashMap::new());
                return;
            }
        };

        if !response.status().is_success() {
            log::warn!(
                "aggregator models endpoint returned {}, cost tracking unavailable.",
                response.status()
            );
            self.cache = Some(HashMap::new());
            return;
        }

        let parsed: Result<ModelsResponse, _> = response.json().await;
        match parsed {
            Ok(models) => self.cache = Some(parse_pricing_response(models)),
            Err(err) => {
                log::warn!("malformed pricing response: {err}. Cost tracking unavailable.");
                self.cache = Some(HashMap::new());
            }
        }
    }
}

fn parse_pricing_response(models: ModelsResponse) -> HashMap<String, ModelPricing> {
    let mut result = HashMap::new();
    for entry in models.data {
        let Some(id) = entry.id else { continue };
        let Some(pricing) = entry.pricing else { continue };
        let Some(prompt_str) = pricing.prompt else {
            continue;
        };
        let Some(completion_str) = pricing.completion else {
            continue;
        };
        let (Ok(prompt_price), Ok(completion_price)) =
            (prompt_str.parse::<f64>(), completion_str.parse::<f64>())
        else {
            continue;
        };
        let context_length = entry
            .context_length
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())));
        result.insert(
            id,
            ModelPricing {
                prompt_price,
                completion_price,
                context_length,
            },
        );
    }
    result
}

/// `input_tokens × prompt_price + output_tokens × completion_price`,
/// computed only if both token counts and both prices are present.
pub fn compute_response_cost(response: &ModelResponse, pricing: Option<&ModelPricing>) -> Option<f64> {
    let pricing = pricing?;
    let input = response.input_tokens?;
    let output = response.output_tokens?;
    Some(input as f64 * pricing.prompt_price + output as f64 * pricing.completion_price)
}
