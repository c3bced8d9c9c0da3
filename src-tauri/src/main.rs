// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod gemini;
mod generator;
mod library;
mod prompt;
mod settings;
mod state;
mod video;

use std::sync::Arc;

use gemini::GeminiClient;
use generator::Studio;
use settings::Settings;

#[tokio::main]
async fn main() {
    env_logger::init();

    let settings = Settings::load();
    let api_key = settings
        .resolve_api_key()
        .expect("No Gemini API key found: set GEMINI_API_KEY or configure one in settings");
    let client = GeminiClient::new(api_key).expect("invalid Gemini API key");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .manage(Studio::new(Arc::new(client)))
        .invoke_handler(tauri::generate_handler![
            generator::create,
            generator::upload_source,
            generator::clear_source,
            generator::set_mixer,
            generator::select_style,
            generator::set_aspect_ratio,
            generator::set_studio_mode,
            generator::promote_result,
            generator::get_inspiration,
            generator::list_styles,
            generator::list_magic_tools,
            generator::snapshot,
            generator::set_api_key,
            library::toggle_selection_mode,
            library::toggle_media_selection,
            library::get_media,
            library::download_media,
            library::export_media
        ])
        .run(tauri::generate_context!())
        .expect("error while running Tauri application");
}
