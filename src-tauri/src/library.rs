use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::info;
use tauri::State;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::generator::Studio;
use crate::state::{AppMessage, GeneratedMedia, MediaKind, StateSnapshot};

const FALLBACK_STEM: &str = "mirror-space";
const MAX_STEM_LEN: usize = 50;

/// Derives a filesystem-safe name from the generating prompt. The id
/// suffix keeps names unique even for identical prompts.
pub fn safe_file_name(prompt: &str, id: i64, kind: MediaKind) -> String {
    let stem: String = prompt
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();
    let stem = if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    };
    format!("{stem}-{id}.{}", kind.extension())
}

/// Writes the given entries into a zip archive. Media is already
/// compressed, so entries are stored as-is.
pub fn write_archive(path: &Path, entries: &[(String, &[u8])]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("could not create archive at {}", path.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in entries {
        writer.start_file(name.as_str(), options)?;
        std::io::Write::write_all(&mut writer, bytes)?;
    }
    writer.finish()?;
    Ok(())
}

fn find_media(studio: &Studio, id: i64) -> Option<Arc<GeneratedMedia>> {
    studio.with_state(|st| st.library.iter().find(|m| m.id == id).cloned())
}

#[tauri::command]
pub fn toggle_selection_mode(studio: State<'_, Studio>) -> Result<StateSnapshot, String> {
    Ok(studio.with_state(|st| {
        st.toggle_selection_mode();
        st.snapshot()
    }))
}

#[tauri::command]
pub fn toggle_media_selection(
    studio: State<'_, Studio>,
    id: i64,
) -> Result<StateSnapshot, String> {
    Ok(studio.with_state(|st| {
        st.toggle_media_selection(id);
        st.snapshot()
    }))
}

/// Returns a media payload as a data URL for display in the webview.
#[tauri::command]
pub fn get_media(studio: State<'_, Studio>, id: i64) -> Result<String, String> {
    let media = find_media(&studio, id).ok_or_else(|| format!("Unknown media id: {id}"))?;
    Ok(format!(
        "data:{};base64,{}",
        media.mime,
        BASE64.encode(&media.bytes)
    ))
}

/// Saves a single item through a native save dialog.
#[tauri::command]
pub fn download_media(studio: State<'_, Studio>, id: i64) -> Result<StateSnapshot, String> {
    let media = find_media(&studio, id).ok_or_else(|| format!("Unknown media id: {id}"))?;
    let suggested = safe_file_name(&media.prompt, media.id, media.kind);

    if let Some(path) = rfd::FileDialog::new().set_file_name(&suggested).save_file() {
        std::fs::write(&path, &media.bytes).map_err(|e| format!("Could not save file: {e}"))?;
        info!("Saved media {} to {}", media.id, path.display());
        studio.with_state(|st| {
            st.message = Some(AppMessage::info(format!(
                "Saved {}.",
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or(suggested)
            )));
        });
    }
    Ok(studio.snapshot())
}

/// Exports media to a zip archive: the given ids, or the whole library
/// when none are given.
#[tauri::command]
pub fn export_media(
    studio: State<'_, Studio>,
    ids: Option<Vec<i64>>,
) -> Result<StateSnapshot, String> {
    let items: Vec<Arc<GeneratedMedia>> = studio.with_state(|st| match &ids {
        Some(ids) => st
            .library
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect(),
        None => st.library.iter().cloned().collect(),
    });

    if items.is_empty() {
        let text = if ids.is_some() {
            "Select media to save first."
        } else {
            "There is nothing to export yet."
        };
        studio.with_state(|st| st.message = Some(AppMessage::warning(text)));
        return Ok(studio.snapshot());
    }

    if let Some(path) = rfd::FileDialog::new()
        .set_file_name("mirror-space-gallery.zip")
        .save_file()
    {
        let entries: Vec<(String, &[u8])> = items
            .iter()
            .map(|m| (safe_file_name(&m.prompt, m.id, m.kind), m.bytes.as_slice()))
            .collect();
        write_archive(&path, &entries).map_err(|e| format!("Could not write archive: {e}"))?;
        info!("Exported {} items to {}", entries.len(), path.display());
        studio.with_state(|st| {
            st.message = Some(AppMessage::info(format!(
                "Exported {} items.",
                entries.len()
            )));
        });
    }
    Ok(studio.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized_and_bounded() {
        assert_eq!(
            safe_file_name("A windy rooftop!", 42, MediaKind::Image),
            "a_windy_rooftop_-42.png"
        );
        assert_eq!(
            safe_file_name("make it dance", 7, MediaKind::Video),
            "make_it_dance-7.mp4"
        );

        let long = "x".repeat(200);
        let name = safe_file_name(&long, 1, MediaKind::Image);
        assert_eq!(name, format!("{}-1.png", "x".repeat(50)));
    }

    #[test]
    fn empty_prompt_falls_back_to_the_app_name() {
        assert_eq!(
            safe_file_name("", 99, MediaKind::Image),
            "mirror-space-99.png"
        );
    }

    #[test]
    fn non_ascii_prompts_become_underscores() {
        assert_eq!(
            safe_file_name("별빛 아래", 3, MediaKind::Image),
            "_____-3.png"
        );
    }

    #[test]
    fn archive_round_trips_its_entries() {
        let path = std::env::temp_dir().join(format!(
            "mirror-space-test-{}.zip",
            std::process::id()
        ));
        let entries = vec![
            ("a-1.png".to_string(), b"first".as_slice()),
            ("b-2.mp4".to_string(), b"second".as_slice()),
        ];
        write_archive(&path, &entries).unwrap();

        let file = File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 2);
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("a-1.png").unwrap(), &mut contents)
            .unwrap();
        assert_eq!(contents, "first");

        std::fs::remove_file(&path).ok();
    }
}
