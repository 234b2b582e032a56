use crate::models::{NutritionRecord, PortionSize};

/// Scale a 100g baseline record to a portion preset.
///
/// Every nutrient is multiplied and rounded to one decimal; `serving_size` and
/// `source` are carried over untouched, and the portion's display label is
/// attached to the copy. Pure function, no I/O.
pub fn scale(record: &NutritionRecord, portion: PortionSize) -> NutritionRecord {
    let m = portion.multiplier();

    NutritionRecord {
        calories: round1(record.calories * m),
        protein: round1(record.protein * m),
        carbs: round1(record.carbs * m),
        fat: round1(record.fat * m),
        fiber: round1(record.fiber * m),
        serving_size: record.serving_size.clone(),
        source: record.source,
        portion_size: Some(portion.label().to_string()),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
