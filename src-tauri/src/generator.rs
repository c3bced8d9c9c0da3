use std::sync::Arc;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::{debug, error};
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use tauri::{AppHandle, Emitter, Runtime, State};

use crate::gemini::{GeminiClient, ImageResult, VisionService};
use crate::prompt;
use crate::settings::Settings;
use crate::state::{
    AppMessage, AspectRatio, MediaKind, Mode, SessionState, SourceSlot, StateSnapshot, StudioMode,
};
use crate::video::{self, ProgressFn};

/// Age slider range in years, applied symmetrically.
const MAX_AGE_DELTA: i32 = 50;

/// Shared application state: the session behind a mutex, the remote
/// client behind a swap lock so a new API key takes effect immediately.
pub struct Studio {
    state: Mutex<SessionState>,
    service: RwLock<Arc<dyn VisionService>>,
}

/// Clears the loading flag on every exit path out of `create`,
/// including early returns and service errors.
struct LoadingGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().loading = false;
    }
}

pub struct CreateRequest {
    pub free_text: String,
    pub override_prompt: Option<String>,
    pub age_delta: Option<i32>,
}

/// Inputs captured under the lock before any remote call is made.
struct CreateInputs {
    studio_mode: StudioMode,
    mode: Mode,
    source1: Option<SourceSlot>,
    source2: Option<SourceSlot>,
    edit_target: Option<(Vec<u8>, String)>,
    mixer: crate::state::MixerWeights,
    selected_style: Option<String>,
    aspect_ratio: AspectRatio,
}

impl Studio {
    pub fn new(service: Arc<dyn VisionService>) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            service: RwLock::new(service),
        }
    }

    fn service(&self) -> Arc<dyn VisionService> {
        self.service.read().clone()
    }

    pub fn set_service(&self, service: Arc<dyn VisionService>) {
        *self.service.write() = service;
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        f(&mut self.state.lock())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.lock().snapshot()
    }

    /// Runs one generation. Outcomes land in the session state: new
    /// media in the library, or a message explaining why nothing ran.
    pub async fn create(&self, req: CreateRequest, progress: ProgressFn) {
        // A reset age slider must never fire a request on its own.
        if req.age_delta == Some(0) {
            return;
        }
        let age_delta = req
            .age_delta
            .map(|d| d.clamp(-MAX_AGE_DELTA, MAX_AGE_DELTA))
            .filter(|d| *d != 0);

        let inputs = {
            let mut st = self.state.lock();
            if st.loading {
                return;
            }
            st.loading = true;
            st.message = None;
            let edit_target = st
                .active_result
                .as_ref()
                .filter(|m| m.kind == MediaKind::Image)
                .map(|m| (m.bytes.clone(), m.mime.clone()));
            CreateInputs {
                studio_mode: st.studio_mode,
                mode: st.mode(),
                source1: st.source1.clone(),
                source2: st.source2.clone(),
                edit_target,
                mixer: st.mixer,
                selected_style: st.selected_style.clone(),
                aspect_ratio: st.aspect_ratio,
            }
        };
        let _guard = LoadingGuard { state: &self.state };
        progress(String::new());

        let outcome = match inputs.studio_mode {
            StudioMode::Video => self.run_video(&req, &inputs, progress).await,
            StudioMode::Image => self.run_image(&req, age_delta, &inputs).await,
        };
        if let Err(err) = outcome {
            error!("Generation failed: {err:#}");
            self.state.lock().message = Some(AppMessage::error(err.to_string()));
        }
    }

    async fn run_video(
        &self,
        req: &CreateRequest,
        inputs: &CreateInputs,
        progress: ProgressFn,
    ) -> Result<()> {
        let Some(source) = inputs.source1.as_ref() else {
            self.warn("Upload a source image to generate a video.");
            return Ok(());
        };
        let prompt = req.free_text.trim();
        if prompt.is_empty() {
            self.warn("Enter a prompt to generate a video.");
            return Ok(());
        }

        let service = self.service();
        let (bytes, mime) =
            video::generate_video(service.as_ref(), &source.bytes, &source.mime, prompt, progress)
                .await?;
        self.state
            .lock()
            .push_media(MediaKind::Video, bytes, mime, prompt.to_string());
        Ok(())
    }

    async fn run_image(
        &self,
        req: &CreateRequest,
        age_delta: Option<i32>,
        inputs: &CreateInputs,
    ) -> Result<()> {
        let service = self.service();
        let style = inputs.selected_style.as_deref();

        match inputs.mode {
            Mode::Recompose => {
                let (s1, s2) = match (inputs.source1.as_ref(), inputs.source2.as_ref()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Ok(()),
                };
                let prompt = prompt::recompose_prompt(inputs.mixer, &req.free_text, style);
                let result = service
                    .recompose_images(&s1.bytes, &s1.mime, &s2.bytes, &s2.mime, &prompt)
                    .await?;
                self.fold_image_result(result, prompt, false)
            }
            Mode::Edit => {
                let Some(prompt) = prompt::edit_prompt(
                    req.override_prompt.as_deref(),
                    age_delta,
                    style,
                    &req.free_text,
                ) else {
                    self.warn("Select a style or enter a prompt first.");
                    return Ok(());
                };
                // A previous image result takes precedence over the raw
                // upload, so edits chain on the latest output.
                let (bytes, mime) = match (&inputs.edit_target, inputs.source1.as_ref()) {
                    (Some((bytes, mime)), _) => (bytes.clone(), mime.clone()),
                    (None, Some(slot)) => (slot.bytes.clone(), slot.mime.clone()),
                    (None, None) => return Ok(()),
                };
                let result = service.edit_image(&bytes, &mime, &prompt).await?;
                self.fold_image_result(result, prompt, false)
            }
            Mode::Generate => {
                if req.free_text.trim().is_empty() {
                    self.warn("Enter a prompt to create an image.");
                    return Ok(());
                }
                let prompt = prompt::generate_prompt(&req.free_text, style);
                let result = service.generate_image(&prompt, inputs.aspect_ratio).await?;
                self.fold_image_result(result, prompt, true)
            }
        }
    }

    /// Books a successful image reply into the library. A text-only
    /// reply means the model declined the request.
    fn fold_image_result(
        &self,
        result: ImageResult,
        prompt: String,
        promote_to_source: bool,
    ) -> Result<()> {
        if let Some(text) = &result.text {
            debug!("Model commentary: {text}");
        }
        let Some((bytes, mime)) = result.image else {
            return Err(anyhow!(
                "The service returned no image. The prompt may have been rejected."
            ));
        };

        let mut st = self.state.lock();
        let media = st.push_media(MediaKind::Image, bytes, mime, prompt);
        if promote_to_source {
            // A prompt-only creation becomes the next edit subject.
            st.source1 = Some(SourceSlot {
                bytes: media.bytes.clone(),
                mime: media.mime.clone(),
                file_name: format!("prompt-generated-{}.png", media.id),
            });
        }
        Ok(())
    }

    fn warn(&self, text: &str) {
        self.state.lock().message = Some(AppMessage::warning(text));
    }
}

fn emit_event<R: Runtime, S: serde::Serialize + Clone>(app: &AppHandle<R>, event: &str, payload: S) {
    app.emit(event, payload)
        .unwrap_or_else(|e| error!("Emit error on {event}: {e}"));
}

#[tauri::command]
pub async fn create<R: Runtime>(
    app: AppHandle<R>,
    studio: State<'_, Studio>,
    free_text: String,
    override_prompt: Option<String>,
    age_delta: Option<i32>,
) -> Result<StateSnapshot, String> {
    emit_event(&app, "generation_started", ());
    emit_event(&app, "loading", true);
    let progress_app = app.clone();
    let progress: ProgressFn = Arc::new(move |message: String| {
        emit_event(&progress_app, "loading_message", message);
    });

    studio
        .create(
            CreateRequest {
                free_text,
                override_prompt,
                age_delta,
            },
            progress,
        )
        .await;

    // The flag may still belong to a concurrent job that rejected this
    // trigger; report what the session actually says, and leave that
    // job's flavor text alone.
    let snap = studio.snapshot();
    if !snap.loading {
        emit_event(&app, "loading_message", String::new());
    }
    emit_event(&app, "loading", snap.loading);
    emit_event(&app, "state", snap.clone());
    Ok(snap)
}

#[tauri::command]
pub fn upload_source(
    studio: State<'_, Studio>,
    slot: u8,
    file_name: String,
    mime: String,
    data: String,
) -> Result<StateSnapshot, String> {
    // Accepts both raw base64 and full data URLs from the webview.
    let payload = data
        .rsplit_once("base64,")
        .map(|(_, tail)| tail)
        .unwrap_or(data.as_str());
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| format!("Could not read the uploaded image: {e}"))?;
    Ok(studio.with_state(|st| {
        st.set_source(
            slot,
            SourceSlot {
                bytes,
                mime,
                file_name,
            },
        );
        st.snapshot()
    }))
}

#[tauri::command]
pub fn clear_source(studio: State<'_, Studio>, slot: u8) -> Result<StateSnapshot, String> {
    Ok(studio.with_state(|st| {
        st.clear_source(slot);
        st.snapshot()
    }))
}

#[tauri::command]
pub fn set_mixer(
    studio: State<'_, Studio>,
    identity: i64,
    style: i64,
    background: i64,
) -> Result<StateSnapshot, String> {
    Ok(studio.with_state(|st| {
        st.mixer = crate::state::MixerWeights::new(identity, style, background);
        st.snapshot()
    }))
}

#[tauri::command]
pub fn select_style(studio: State<'_, Studio>, style_id: String) -> Result<StateSnapshot, String> {
    Ok(studio.with_state(|st| {
        st.toggle_style(style_id);
        st.snapshot()
    }))
}

#[tauri::command]
pub fn set_aspect_ratio(studio: State<'_, Studio>, ratio: String) -> Result<StateSnapshot, String> {
    let ratio = AspectRatio::from_id(&ratio).ok_or_else(|| format!("Unknown aspect ratio: {ratio}"))?;
    Ok(studio.with_state(|st| {
        st.set_aspect_ratio(ratio);
        st.snapshot()
    }))
}

#[tauri::command]
pub fn set_studio_mode(studio: State<'_, Studio>, mode: String) -> Result<StateSnapshot, String> {
    let mode = StudioMode::from_id(&mode).ok_or_else(|| format!("Unknown studio mode: {mode}"))?;
    Ok(studio.with_state(|st| {
        st.studio_mode = mode;
        st.snapshot()
    }))
}

/// Moves the active image result into source slot 1 so the user can
/// keep editing or recomposing on top of it.
#[tauri::command]
pub fn promote_result(studio: State<'_, Studio>) -> Result<StateSnapshot, String> {
    studio.with_state(|st| {
        let media = st
            .active_result
            .as_ref()
            .filter(|m| m.kind == MediaKind::Image)
            .cloned()
            .ok_or_else(|| "There is no image result to continue from.".to_string())?;
        st.source1 = Some(SourceSlot {
            bytes: media.bytes.clone(),
            mime: media.mime.clone(),
            file_name: format!("promoted-{}.png", media.id),
        });
        st.source2 = None;
        Ok(st.snapshot())
    })
}

#[tauri::command]
pub fn get_inspiration() -> String {
    prompt::INSPIRATION_PROMPTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}

#[tauri::command]
pub fn list_styles() -> Vec<&'static str> {
    prompt::ENHANCEMENT_PROMPTS.iter().map(|(id, _)| *id).collect()
}

#[tauri::command]
pub fn list_magic_tools() -> Vec<(String, String)> {
    prompt::MAGIC_TOOL_PROMPTS
        .iter()
        .map(|(id, p)| (id.to_string(), p.to_string()))
        .collect()
}

#[tauri::command]
pub fn snapshot(studio: State<'_, Studio>) -> StateSnapshot {
    studio.snapshot()
}

#[tauri::command]
pub fn set_api_key(studio: State<'_, Studio>, key: String) -> Result<(), String> {
    let client = GeminiClient::new(key.clone()).map_err(|e| e.to_string())?;
    let mut settings = Settings::load();
    settings.gemini_api_key = Some(key);
    settings.save().map_err(|e| e.to_string())?;
    studio.set_service(Arc::new(client));
    Ok(())
}
