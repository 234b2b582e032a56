use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::handlers::{AnalysisReport, AnalyzeHandler};
use crate::models::{ImageInput, NutritionRecord};

const DEFAULT_MODEL: &str = "nateraw/food";

pub struct AppState {
    pub handler: Arc<AnalyzeHandler>,
    pub upload_dir: PathBuf,
}

pub fn create_router(handler: Arc<AnalyzeHandler>, upload_dir: PathBuf) -> Router {
    let serve_uploads = ServeDir::new(&upload_dir);
    let state = Arc::new(AppState {
        handler,
        upload_dir,
    });

    Router::new()
        .route("/", get(index_handler).post(analyze_handler))
        .route("/health", get(health_check))
        .nest_service("/uploads", serve_uploads)
        .with_state(state)
}

async fn index_handler() -> Html<String> {
    Html(render_form_page(None))
}

async fn health_check() -> &'static str {
    "OK"
}

/// One form submission: `model` plus either `image_url` or `image_file`.
/// Missing image or failed classification re-renders the form; no partial
/// results are ever shown.
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Html<String>, StatusCode> {
    let mut model_id = DEFAULT_MODEL.to_string();
    let mut image: Option<ImageInput> = None;
    let mut saved_upload: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        log::error!("❌ Failed to read multipart field: {}", e);
        StatusCode::BAD_REQUEST
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("model") => {
                if let Ok(value) = field.text().await {
                    if !value.trim().is_empty() {
                        model_id = value.trim().to_string();
                    }
                }
            }
            Some("image_url") => {
                if let Ok(value) = field.text().await {
                    let value = value.trim().to_string();
                    if !value.is_empty() {
                        image = Some(ImageInput::Url(value));
                    }
                }
            }
            Some("image_file") => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let Ok(bytes) = field.bytes().await else {
                    continue;
                };
                if original_name.is_empty() || bytes.is_empty() {
                    continue;
                }

                match save_upload(&state.upload_dir, &original_name, &bytes) {
                    Ok(filename) => saved_upload = Some(filename),
                    Err(e) => {
                        // The analysis works off the in-memory bytes either
                        // way; losing the copy on disk only costs the preview.
                        log::warn!("⚠️ Failed to save upload '{}': {}", original_name, e);
                    }
                }
                image = Some(ImageInput::Bytes(bytes.to_vec()));
            }
            _ => {}
        }
    }

    let Some(image) = image else {
        log::info!("ℹ️ Form submitted without an image");
        return Ok(Html(render_form_page(Some(
            "Please provide an image URL or upload a photo.",
        ))));
    };

    let report = state.handler.analyze(&image, &model_id).await.map_err(|e| {
        log::error!("❌ Analysis failed: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match report {
        Some(report) => Ok(Html(render_result_page(&report, saved_upload.as_deref()))),
        None => Ok(Html(render_form_page(Some(
            "Could not classify that image. Try another photo or model.",
        )))),
    }
}

/// Persist an upload under a generated unique name, keeping the original
/// extension so the static file server picks a sensible content type.
fn save_upload(upload_dir: &std::path::Path, original_name: &str, bytes: &[u8]) -> anyhow::Result<String> {
    let extension = std::path::Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .unwrap_or("jpg");
    let filename = format!("{}.{}", Uuid::new_v4(), extension);

    std::fs::create_dir_all(upload_dir)?;
    std::fs::write(upload_dir.join(&filename), bytes)?;

    log::info!("💾 Saved upload: {} ({} bytes)", filename, bytes.len());
    Ok(filename)
}

fn render_form_page(notice: Option<&str>) -> String {
    let notice_html = notice
        .map(|n| format!("<p class=\"notice\">{}</p>", n))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n\
         <html><head><title>FoodLens</title>{}</head><body>\n\
         <h1>🍽️ FoodLens</h1>\n\
         <p>Upload a food photo or paste an image URL to get nutrition facts.</p>\n\
         {}\n\
         <form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\n\
         <label>Model\n\
         <select name=\"model\">\n\
         <option value=\"nateraw/food\">nateraw/food</option>\n\
         <option value=\"Kaludi/food-category-classification-v2.0\">Kaludi/food-category-classification-v2.0</option>\n\
         </select></label><br>\n\
         <label>Image URL <input type=\"text\" name=\"image_url\" placeholder=\"https://...\"></label><br>\n\
         <label>Or upload <input type=\"file\" name=\"image_file\" accept=\"image/*\"></label><br>\n\
         <button type=\"submit\">Analyze</button>\n\
         </form>\n\
         </body></html>",
        PAGE_STYLE, notice_html
    )
}

fn render_result_page(report: &AnalysisReport, saved_upload: Option<&str>) -> String {
    let photo_html = saved_upload
        .map(|f| format!("<img src=\"/uploads/{}\" alt=\"submitted photo\" width=\"320\">", f))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n\
         <html><head><title>FoodLens - {food}</title>{style}</head><body>\n\
         <h1>🍽️ {food}</h1>\n\
         <p>Confidence: <strong>{confidence}%</strong> (model: {model})</p>\n\
         {photo}\n\
         <h2>Nutrition</h2>\n\
         {small}\n{medium}\n{large}\n\
         <p><a href=\"/\">Analyze another photo</a></p>\n\
         </body></html>",
        food = report.prediction.food_item,
        confidence = report.prediction.confidence,
        model = report.prediction.model_used,
        photo = photo_html,
        style = PAGE_STYLE,
        small = render_portion_table(&report.nutrition.small),
        medium = render_portion_table(&report.nutrition.medium),
        large = render_portion_table(&report.nutrition.large),
    )
}

fn render_portion_table(record: &NutritionRecord) -> String {
    let fallback_note = if record.source.is_fallback() {
        "<p class=\"notice\">Estimated values: the nutrition provider was unavailable.</p>"
    } else {
        ""
    };

    format!(
        "<h3>{portion}</h3>\n\
         <table>\n\
         <tr><td>Calories</td><td>{:.1} kcal</td></tr>\n\
         <tr><td>Protein</td><td>{:.1} g</td></tr>\n\
         <tr><td>Carbs</td><td>{:.1} g</td></tr>\n\
         <tr><td>Fat</td><td>{:.1} g</td></tr>\n\
         <tr><td>Fiber</td><td>{:.1} g</td></tr>\n\
         </table>\n\
         {fallback_note}\n\
         <p class=\"source\">Source: {source}</p>",
        record.calories,
        record.protein,
        record.carbs,
        record.fat,
        record.fiber,
        portion = record.portion_size.as_deref().unwrap_or(&record.serving_size),
        source = record.source,
    )
}

const PAGE_STYLE: &str = "<style>\
    body { font-family: sans-serif; max-width: 640px; margin: 2em auto; }\
    table { border-collapse: collapse; }\
    td { border: 1px solid #ccc; padding: 4px 12px; }\
    .notice { color: #b00; }\
    .source { color: #666; font-size: 0.85em; }\
    </style>";
