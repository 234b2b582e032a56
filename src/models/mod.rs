use serde::{Deserialize, Serialize};

/// Flat nutrition facts for one serving of one food item.
///
/// Records are immutable once fetched; `portion_size` is only ever set on the
/// scaled copy produced by the portion calculator, never on the cached base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(default)]
    pub fiber: f64,
    pub serving_size: String,
    pub source: RecordSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portion_size: Option<String>,
}

/// Where a nutrition record came from. Callers branch on the variant instead of
/// string-matching; the serialized form keeps the human-readable names stored in
/// the cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordSource {
    #[serde(rename = "Edamam API")]
    Edamam,
    #[serde(rename = "Local Fallback")]
    LocalFallback,
}

impl RecordSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, RecordSource::LocalFallback)
    }
}

impl std::fmt::Display for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordSource::Edamam => "Edamam API",
            RecordSource::LocalFallback => "Local Fallback",
        };
        write!(f, "{}", s)
    }
}

/// Top-1 output of an image classification call. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub food_item: String,
    /// Percent, rounded to one decimal (0.0 - 100.0).
    pub confidence: f64,
    pub model_used: String,
}

/// The three fixed portion presets applied to a 100g baseline record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortionSize {
    Small,
    Medium,
    Large,
}

impl PortionSize {
    /// Unrecognized names fall back to Medium rather than erroring.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "small" => PortionSize::Small,
            "large" => PortionSize::Large,
            _ => PortionSize::Medium,
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            PortionSize::Small => 0.7,
            PortionSize::Medium => 1.0,
            PortionSize::Large => 1.5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PortionSize::Small => "Small (150g)",
            PortionSize::Medium => "Medium (250g)",
            PortionSize::Large => "Large (350g)",
        }
    }
}

/// An image handed to the classifier: either a remote URL to fetch or bytes
/// already read from an upload.
#[derive(Debug, Clone)]
pub enum ImageInput {
    Url(String),
    Bytes(Vec<u8>),
}
