pub mod cache;
pub mod classifier; // Hosted image-classification API
pub mod edamam; // Edamam nutrition-data API
pub mod portion;

pub use cache::NutritionCache;
pub use classifier::{Classifier, HuggingFaceClassifier};
pub use edamam::NutritionProvider;
