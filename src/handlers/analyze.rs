use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::models::{ImageInput, NutritionRecord, PortionSize, PredictionResult};
use crate::services::edamam::DEFAULT_SERVING_SIZE;
use crate::services::{portion, Classifier, NutritionProvider};

/// Prediction plus the three portion-scaled nutrition breakdowns rendered to
/// the user. Either everything is present or nothing is shown.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub prediction: PredictionResult,
    pub nutrition: PortionBreakdown,
}

#[derive(Debug, Serialize)]
pub struct PortionBreakdown {
    pub small: NutritionRecord,
    pub medium: NutritionRecord,
    pub large: NutritionRecord,
}

/// Orchestrates one analysis request: classify, then look up and scale
/// nutrition for each portion preset.
pub struct AnalyzeHandler {
    classifier: Arc<dyn Classifier>,
    nutrition: Arc<NutritionProvider>,
}

impl AnalyzeHandler {
    pub fn new(classifier: Arc<dyn Classifier>, nutrition: Arc<NutritionProvider>) -> Self {
        Self {
            classifier,
            nutrition,
        }
    }

    /// `Ok(None)` means classification produced nothing and the caller should
    /// re-render the input form; no partial results are ever returned.
    /// Nutrition lookups cannot fail the pipeline (the provider degrades to a
    /// fallback record), but cache I/O errors do propagate.
    pub async fn analyze(
        &self,
        image: &ImageInput,
        model_id: &str,
    ) -> Result<Option<AnalysisReport>> {
        let Some(prediction) = self.classifier.classify(image, model_id).await else {
            log::info!("ℹ️ No prediction for this image, skipping nutrition lookup");
            return Ok(None);
        };

        // The first fetch populates the cache; the other two are hits.
        let nutrition = PortionBreakdown {
            small: self.portion(&prediction.food_item, "small").await?,
            medium: self.portion(&prediction.food_item, "medium").await?,
            large: self.portion(&prediction.food_item, "large").await?,
        };

        Ok(Some(AnalysisReport {
            prediction,
            nutrition,
        }))
    }

    /// Fetch the 100g base record and scale it to the named portion preset
    /// (unknown names mean Medium).
    async fn portion(&self, food_item: &str, portion_name: &str) -> Result<NutritionRecord> {
        let base = self.nutrition.fetch(food_item, DEFAULT_SERVING_SIZE).await?;
        Ok(portion::scale(&base, PortionSize::parse(portion_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordSource;
    use crate::services::NutritionCache;
    use async_trait::async_trait;

    struct StubClassifier {
        prediction: Option<PredictionResult>,
    }

    #[async_trait]
    impl Classifier for StubClassifier {
        async fn classify(&self, _image: &ImageInput, _model_id: &str) -> Option<PredictionResult> {
            self.prediction.clone()
        }
    }

    fn pizza_stub() -> Arc<dyn Classifier> {
        Arc::new(StubClassifier {
            prediction: Some(PredictionResult {
                food_item: "pizza".to_string(),
                confidence: 92.3,
                model_used: "stub/food".to_string(),
            }),
        })
    }

    /// Provider whose endpoint is unreachable; only the seeded cache can
    /// answer, so the test never leaves the process.
    fn offline_provider(cache: Arc<NutritionCache>) -> Arc<NutritionProvider> {
        Arc::new(
            NutritionProvider::new("id".to_string(), "key".to_string(), cache)
                .with_base_url("http://127.0.0.1:9/api/nutrition-data"),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_three_portion_breakdowns() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(NutritionCache::new(dir.path().join("cache.json")));
        cache
            .put(
                "pizza_100g",
                NutritionRecord {
                    calories: 300.0,
                    protein: 12.0,
                    carbs: 33.0,
                    fat: 10.0,
                    fiber: 2.0,
                    serving_size: "100g".to_string(),
                    source: RecordSource::Edamam,
                    portion_size: None,
                },
            )
            .unwrap();

        let handler = AnalyzeHandler::new(pizza_stub(), offline_provider(cache));

        let report = handler
            .analyze(&ImageInput::Bytes(vec![1, 2, 3]), "stub/food")
            .await
            .unwrap()
            .expect("stub prediction should produce a report");

        assert_eq!(report.prediction.food_item, "pizza");
        assert_eq!(report.prediction.confidence, 92.3);

        assert_eq!(report.nutrition.small.calories, 210.0);
        assert_eq!(report.nutrition.medium.calories, 300.0);
        assert_eq!(report.nutrition.large.calories, 450.0);

        assert_eq!(report.nutrition.small.portion_size.as_deref(), Some("Small (150g)"));
        assert_eq!(report.nutrition.medium.portion_size.as_deref(), Some("Medium (250g)"));
        assert_eq!(report.nutrition.large.portion_size.as_deref(), Some("Large (350g)"));
    }

    #[tokio::test]
    async fn test_failed_classification_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(NutritionCache::new(dir.path().join("cache.json")));
        let classifier = Arc::new(StubClassifier { prediction: None });

        let handler = AnalyzeHandler::new(classifier, offline_provider(cache.clone()));

        let report = handler
            .analyze(&ImageInput::Bytes(vec![1, 2, 3]), "stub/food")
            .await
            .unwrap();

        assert!(report.is_none());
        // No nutrition work happened either.
        assert_eq!(cache.len().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_provider_outage_still_yields_full_report() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(NutritionCache::new(dir.path().join("cache.json")));

        let handler = AnalyzeHandler::new(pizza_stub(), offline_provider(cache));

        let report = handler
            .analyze(&ImageInput::Bytes(vec![1, 2, 3]), "stub/food")
            .await
            .unwrap()
            .expect("fallback keeps the pipeline alive");

        // Fallback base is 200 kcal; portions scale it like any other record.
        assert_eq!(report.nutrition.small.calories, 140.0);
        assert_eq!(report.nutrition.medium.calories, 200.0);
        assert_eq!(report.nutrition.large.calories, 300.0);
        assert!(report.nutrition.medium.source.is_fallback());
    }
}
