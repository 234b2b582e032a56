use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{NutritionRecord, RecordSource};
use crate::services::cache::NutritionCache;

const EDAMAM_ENDPOINT: &str = "https://api.edamam.com/api/nutrition-data";

pub const DEFAULT_SERVING_SIZE: &str = "100g";

/// The ways a nutrition lookup can fail upstream. Every variant maps to the
/// same recovery: log it and hand the caller the local fallback record.
#[derive(Debug, Error)]
pub enum NutritionError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("nutrition API returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed nutrition response: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct EdamamResponse {
    #[serde(default)]
    calories: f64,
    #[serde(default, rename = "totalNutrients")]
    total_nutrients: HashMap<String, Nutrient>,
}

#[derive(Debug, Deserialize)]
struct Nutrient {
    #[serde(default)]
    quantity: f64,
}

impl EdamamResponse {
    fn nutrient(&self, code: &str) -> f64 {
        self.total_nutrients
            .get(code)
            .map(|n| n.quantity)
            .unwrap_or(0.0)
    }
}

/// Edamam nutrition-data client with a read-through file cache.
///
/// Provider failures never propagate: the caller always gets a usable record,
/// distinguishable from a real lookup only by its `RecordSource` variant.
/// Cache I/O errors do propagate (fatal for the request).
pub struct NutritionProvider {
    app_id: String,
    app_key: String,
    base_url: String,
    cache: Arc<NutritionCache>,
    client: reqwest::Client,
}

impl NutritionProvider {
    pub fn new(app_id: String, app_key: String, cache: Arc<NutritionCache>) -> Self {
        Self {
            app_id,
            app_key,
            base_url: EDAMAM_ENDPOINT.to_string(),
            cache,
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at a different endpoint (tests, self-hosted proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch nutrition facts for `food_item` at `serving_size`, consulting the
    /// cache first and populating it on a successful miss.
    pub async fn fetch(&self, food_item: &str, serving_size: &str) -> Result<NutritionRecord> {
        let key = NutritionCache::cache_key(food_item, serving_size);

        if let Some(cached) = self.cache.get(&key)? {
            log::debug!("✅ Nutrition cache hit: {}", key);
            return Ok(cached);
        }

        match self.request_nutrition(food_item, serving_size).await {
            Ok(record) => {
                log::info!(
                    "🥗 Fetched nutrition for '{}' ({}): {} kcal",
                    food_item,
                    serving_size,
                    record.calories
                );
                self.cache.put(&key, record.clone())?;
                Ok(record)
            }
            Err(e) => {
                // Degrade rather than fail the request. The fallback is not
                // cached, so a later fetch retries the provider.
                log::warn!("⚠️ Nutrition lookup failed for '{}': {}", food_item, e);
                Ok(Self::fallback_record())
            }
        }
    }

    async fn request_nutrition(
        &self,
        food_item: &str,
        serving_size: &str,
    ) -> Result<NutritionRecord, NutritionError> {
        let ingredient = format!("{} {}", serving_size, food_item);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("app_id", self.app_id.as_str()),
                ("app_key", self.app_key.as_str()),
                ("ingr", ingredient.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("❌ Edamam API error ({}): {}", status, body);
            return Err(NutritionError::Status(status));
        }

        let body = response.text().await?;
        let parsed: EdamamResponse = serde_json::from_str(&body)?;

        Ok(NutritionRecord {
            calories: parsed.calories,
            protein: parsed.nutrient("PROCNT"),
            carbs: parsed.nutrient("CHOCDF"),
            fat: parsed.nutrient("FAT"),
            fiber: parsed.nutrient("FIBTG"),
            serving_size: serving_size.to_string(),
            source: RecordSource::Edamam,
            portion_size: None,
        })
    }

    /// Fixed local estimate returned when the provider is unreachable or its
    /// response cannot be parsed.
    pub fn fallback_record() -> NutritionRecord {
        NutritionRecord {
            calories: 200.0,
            protein: 10.0,
            carbs: 20.0,
            fat: 5.0,
            fiber: 0.0,
            serving_size: DEFAULT_SERVING_SIZE.to_string(),
            source: RecordSource::LocalFallback,
            portion_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with_dead_endpoint(cache: Arc<NutritionCache>) -> NutritionProvider {
        // Nothing listens on this port; every miss becomes a network error.
        NutritionProvider::new("test_id".to_string(), "test_key".to_string(), cache)
            .with_base_url("http://127.0.0.1:9/api/nutrition-data")
    }

    #[tokio::test]
    async fn test_unreachable_provider_returns_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(NutritionCache::new(dir.path().join("cache.json")));
        let provider = provider_with_dead_endpoint(cache.clone());

        let record = provider.fetch("pizza", "100g").await.unwrap();

        assert_eq!(record, NutritionProvider::fallback_record());
        assert_eq!(record.calories, 200.0);
        assert_eq!(record.protein, 10.0);
        assert_eq!(record.carbs, 20.0);
        assert_eq!(record.fat, 5.0);
        assert_eq!(record.serving_size, "100g");
        assert!(record.source.is_fallback());
    }

    #[tokio::test]
    async fn test_fallback_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(NutritionCache::new(dir.path().join("cache.json")));
        let provider = provider_with_dead_endpoint(cache.clone());

        provider.fetch("pizza", "100g").await.unwrap();

        assert!(cache.get("pizza_100g").unwrap().is_none());
        assert_eq!(cache.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cached_key_skips_outbound_call() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(NutritionCache::new(dir.path().join("cache.json")));

        let stored = NutritionRecord {
            calories: 266.0,
            protein: 11.0,
            carbs: 33.0,
            fat: 9.8,
            fiber: 2.3,
            serving_size: "100g".to_string(),
            source: RecordSource::Edamam,
            portion_size: None,
        };
        cache.put("pizza_100g", stored.clone()).unwrap();

        // The endpoint is unreachable, so anything but a cache hit would have
        // come back as the fallback record.
        let provider = provider_with_dead_endpoint(cache);
        let record = provider.fetch("Pizza", "100g").await.unwrap();

        assert_eq!(record, stored);
        assert!(!record.source.is_fallback());
    }

    #[test]
    fn test_response_flattening_defaults_missing_nutrients() {
        let body = r#"{
            "calories": 95,
            "totalNutrients": {
                "PROCNT": {"label": "Protein", "quantity": 0.5, "unit": "g"},
                "FAT": {"label": "Fat", "quantity": 0.3, "unit": "g"}
            }
        }"#;

        let parsed: EdamamResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.calories, 95.0);
        assert_eq!(parsed.nutrient("PROCNT"), 0.5);
        assert_eq!(parsed.nutrient("FAT"), 0.3);
        assert_eq!(parsed.nutrient("CHOCDF"), 0.0);
        assert_eq!(parsed.nutrient("FIBTG"), 0.0);
    }
}
