mod handlers;
mod models;
#[cfg(feature = "web-server")]
mod server;
mod services;

use anyhow::Result;
use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use handlers::AnalyzeHandler;
use services::{Classifier, HuggingFaceClassifier, NutritionCache, NutritionProvider};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    log::info!("🚀 Starting FoodLens...");

    // Load configuration
    let edamam_app_id = env::var("EDAMAM_APP_ID")
        .expect("EDAMAM_APP_ID must be set in .env file");
    let edamam_app_key = env::var("EDAMAM_APP_KEY")
        .expect("EDAMAM_APP_KEY must be set in .env file");

    // Optional: raises the hosted-inference rate limit when present
    let hf_api_token = env::var("HF_API_TOKEN").ok();

    let cache_path = env::var("NUTRITION_CACHE")
        .unwrap_or_else(|_| "nutrition_cache.json".to_string());
    let upload_dir: PathBuf = env::var("UPLOAD_DIR")
        .unwrap_or_else(|_| "static/uploads".to_string())
        .into();

    std::fs::create_dir_all(&upload_dir)?;

    let cache = Arc::new(NutritionCache::new(&cache_path));
    log::info!(
        "✅ Nutrition cache initialized: {} ({} entries)",
        cache_path,
        cache.len().unwrap_or(0)
    );

    let nutrition = Arc::new(NutritionProvider::new(edamam_app_id, edamam_app_key, cache));
    log::info!("✅ Nutrition provider initialized (Edamam)");

    let classifier =
        Arc::new(HuggingFaceClassifier::new(hf_api_token)) as Arc<dyn Classifier>;
    log::info!("✅ Classifier initialized (Hugging Face hosted inference)");

    let handler = Arc::new(AnalyzeHandler::new(classifier, nutrition));
    log::info!("✅ Analyze handler initialized");

    #[cfg(feature = "web-server")]
    {
        let port = env::var("PORT").unwrap_or_else(|_| "5000".to_string());
        let addr = format!("0.0.0.0:{}", port);
        let app = server::create_router(handler.clone(), upload_dir.clone());

        log::info!("🌐 Web server starting on {}", addr);

        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .expect("Failed to bind web server");
            axum::serve(listener, app)
                .await
                .expect("Failed to start web server");
        });

        log::info!("✅ Web server started");

        println!("\n🍽️ FoodLens is running!");
        println!("🌐 Open http://localhost:{}", port);
        println!("📸 Upload a food photo or paste an image URL");
        println!("\n🛑 Press Ctrl+C to stop\n");
    }

    // Keep running
    tokio::signal::ctrl_c().await?;

    log::info!("🛑 Shutting down...");

    Ok(())
}
