use async_trait::async_trait;
use image::ImageOutputFormat;
use serde::Deserialize;
use std::io::Cursor;
use thiserror::Error;

use crate::models::{ImageInput, PredictionResult};

const HF_INFERENCE_ENDPOINT: &str = "https://api-inference.huggingface.co";

/// Seam between orchestration and the hosted model, so handlers can be tested
/// against a stub.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Identify the food in an image. Any failure (bad image, unknown model,
    /// network trouble) is absorbed and reported as `None`; the caller skips
    /// nutrition work instead of rendering a partial result.
    async fn classify(&self, image: &ImageInput, model_id: &str) -> Option<PredictionResult>;
}

#[derive(Debug, Error)]
enum ClassifierError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("image fetch returned HTTP {0}")]
    ImageFetchStatus(reqwest::StatusCode),
    #[error("unreadable image: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("model '{0}' returned HTTP {1}")]
    ModelStatus(String, reqwest::StatusCode),
    #[error("malformed model response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("model returned no predictions")]
    EmptyPrediction,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// Image classification via the Hugging Face hosted-inference API. The model
/// named by `model_id` stays opaque: JPEG bytes in, label/score list out
/// (scores already softmax-normalized server-side).
pub struct HuggingFaceClassifier {
    api_token: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl HuggingFaceClassifier {
    pub fn new(api_token: Option<String>) -> Self {
        Self {
            api_token,
            base_url: HF_INFERENCE_ENDPOINT.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn run(&self, image: &ImageInput, model_id: &str) -> Result<PredictionResult, ClassifierError> {
        let raw = self.load_image_bytes(image).await?;

        // Normalize to 3-channel RGB regardless of source format, then
        // re-encode as JPEG for the inference request. Undecodable bytes
        // fail here, before anything goes over the wire.
        let decoded = image::load_from_memory(&raw)?;
        let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());

        let mut jpeg = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut jpeg), ImageOutputFormat::Jpeg(90))?;

        log::debug!(
            "🖼️ Image normalized: {} raw bytes -> {} jpeg bytes",
            raw.len(),
            jpeg.len()
        );

        let url = format!("{}/models/{}", self.base_url, model_id);
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "image/jpeg")
            .body(jpeg);

        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("❌ Inference API error ({}): {}", status, body);
            return Err(ClassifierError::ModelStatus(model_id.to_string(), status));
        }

        let body = response.text().await?;
        let predictions: Vec<LabelScore> = serde_json::from_str(&body)?;

        let top = top_prediction(&predictions).ok_or(ClassifierError::EmptyPrediction)?;

        Ok(PredictionResult {
            food_item: top.label.clone(),
            confidence: (top.score * 100.0 * 10.0).round() / 10.0,
            model_used: model_id.to_string(),
        })
    }

    async fn load_image_bytes(&self, image: &ImageInput) -> Result<Vec<u8>, ClassifierError> {
        match image {
            ImageInput::Bytes(bytes) => Ok(bytes.clone()),
            ImageInput::Url(url) => {
                log::debug!("🌐 Fetching image from URL: {}", url);
                let response = self.client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ClassifierError::ImageFetchStatus(status));
                }
                Ok(response.bytes().await?.to_vec())
            }
        }
    }
}

fn top_prediction(predictions: &[LabelScore]) -> Option<&LabelScore> {
    predictions
        .iter()
        .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
}

#[async_trait]
impl Classifier for HuggingFaceClassifier {
    async fn classify(&self, image: &ImageInput, model_id: &str) -> Option<PredictionResult> {
        match self.run(image, model_id).await {
            Ok(prediction) => {
                log::info!(
                    "🔍 Classified as '{}' ({}% via {})",
                    prediction.food_item,
                    prediction.confidence,
                    prediction.model_used
                );
                Some(prediction)
            }
            Err(e) => {
                log::warn!("⚠️ Classification failed: {}", e);
                None
            }
        }
    }
}
