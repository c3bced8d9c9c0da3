use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

/// A raw uploaded image held in one of the two source slots.
#[derive(Clone)]
pub struct SourceSlot {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

/// Blend percentages for recompose mode, each in 0..=100.
#[derive(Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixerWeights {
    pub identity_preservation: u8,
    pub style_mix: u8,
    pub background_mix: u8,
}

impl Default for MixerWeights {
    fn default() -> Self {
        Self {
            identity_preservation: 100,
            style_mix: 100,
            background_mix: 100,
        }
    }
}

impl MixerWeights {
    pub fn new(identity: i64, style: i64, background: i64) -> Self {
        let clamp = |v: i64| v.clamp(0, 100) as u8;
        Self {
            identity_preservation: clamp(identity),
            style_mix: clamp(style),
            background_mix: clamp(background),
        }
    }
}

/// The operating mode, derived from slot presence and never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Generate,
    Edit,
    Recompose,
}

pub fn resolve_mode(slot1_present: bool, slot2_present: bool) -> Mode {
    match (slot1_present, slot2_present) {
        (true, true) => Mode::Recompose,
        (true, false) => Mode::Edit,
        _ => Mode::Generate,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StudioMode {
    Image,
    Video,
}

impl Default for StudioMode {
    fn default() -> Self {
        StudioMode::Image
    }
}

impl StudioMode {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "image" => Some(StudioMode::Image),
            "video" => Some(StudioMode::Video),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Wide,
    Tall,
    Classic,
    Portrait,
}

impl Default for AspectRatio {
    fn default() -> Self {
        AspectRatio::Square
    }
}

impl AspectRatio {
    pub fn id(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Wide => "16:9",
            AspectRatio::Tall => "9:16",
            AspectRatio::Classic => "4:3",
            AspectRatio::Portrait => "3:4",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "1:1" => Some(AspectRatio::Square),
            "16:9" => Some(AspectRatio::Wide),
            "9:16" => Some(AspectRatio::Tall),
            "4:3" => Some(AspectRatio::Classic),
            "3:4" => Some(AspectRatio::Portrait),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Image => "png",
            MediaKind::Video => "mp4",
        }
    }
}

/// A generated artifact. Immutable once created; owned by the library
/// for the lifetime of the session.
pub struct GeneratedMedia {
    pub id: i64,
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
    pub mime: String,
    pub prompt: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Clone, Serialize)]
pub struct AppMessage {
    pub text: String,
    pub severity: Severity,
}

impl AppMessage {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Warning,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Info,
        }
    }
}

/// All per-session state, owned by the orchestrator behind a mutex and
/// mutated only at command boundaries.
#[derive(Default)]
pub struct SessionState {
    pub source1: Option<SourceSlot>,
    pub source2: Option<SourceSlot>,
    pub mixer: MixerWeights,
    pub selected_style: Option<String>,
    pub aspect_ratio: AspectRatio,
    pub studio_mode: StudioMode,
    pub library: Vec<Arc<GeneratedMedia>>,
    pub active_result: Option<Arc<GeneratedMedia>>,
    pub message: Option<AppMessage>,
    pub loading: bool,
    pub selection_mode: bool,
    pub selected_ids: HashSet<i64>,
}

impl SessionState {
    pub fn mode(&self) -> Mode {
        resolve_mode(self.source1.is_some(), self.source2.is_some())
    }

    /// Creation-timestamp id, bumped until unique within the session so
    /// rapid successive generations never collide.
    fn unique_media_id(&self) -> i64 {
        let mut id = chrono::Utc::now().timestamp_millis();
        while self.library.iter().any(|m| m.id == id) {
            id += 1;
        }
        id
    }

    /// Prepends a new artifact to the library and makes it the active result.
    pub fn push_media(
        &mut self,
        kind: MediaKind,
        bytes: Vec<u8>,
        mime: String,
        prompt: String,
    ) -> Arc<GeneratedMedia> {
        let media = Arc::new(GeneratedMedia {
            id: self.unique_media_id(),
            kind,
            bytes,
            mime,
            prompt,
        });
        self.library.insert(0, media.clone());
        self.active_result = Some(media.clone());
        media
    }

    pub fn set_source(&mut self, slot: u8, source: SourceSlot) {
        if slot == 1 {
            // A fresh upload replaces a prompt-only result as the next
            // edit target, unless we are mid-recompose.
            if self.mode() != Mode::Recompose {
                self.active_result = None;
            }
            self.source1 = Some(source);
        } else {
            self.source2 = Some(source);
        }
    }

    pub fn clear_source(&mut self, slot: u8) {
        if slot == 1 {
            self.source1 = None;
        } else {
            self.source2 = None;
        }
    }

    /// Aspect ratio only applies to a fresh canvas: switching it clears
    /// both slots and the active result, reverting the mode to generate.
    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        if ratio == self.aspect_ratio {
            return;
        }
        self.aspect_ratio = ratio;
        if self.source1.is_some() || self.source2.is_some() || self.active_result.is_some() {
            self.source1 = None;
            self.source2 = None;
            self.active_result = None;
            self.message = Some(AppMessage::info(
                "Aspect ratio updated. Source images were cleared.",
            ));
        }
    }

    pub fn toggle_style(&mut self, style_id: String) {
        if self.selected_style.as_deref() == Some(style_id.as_str()) {
            self.selected_style = None;
        } else {
            self.selected_style = Some(style_id);
        }
    }

    pub fn toggle_selection_mode(&mut self) {
        self.selection_mode = !self.selection_mode;
        self.selected_ids.clear();
    }

    pub fn toggle_media_selection(&mut self, id: i64) {
        if !self.selection_mode {
            return;
        }
        if !self.selected_ids.remove(&id) {
            self.selected_ids.insert(id);
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let source_info = |slot: &Option<SourceSlot>| {
            slot.as_ref().map(|s| SourceInfo {
                file_name: s.file_name.clone(),
                mime: s.mime.clone(),
            })
        };
        StateSnapshot {
            mode: self.mode(),
            studio_mode: self.studio_mode,
            aspect_ratio: self.aspect_ratio.id(),
            mixer: self.mixer,
            selected_style: self.selected_style.clone(),
            loading: self.loading,
            message: self.message.clone(),
            source1: source_info(&self.source1),
            source2: source_info(&self.source2),
            selection_mode: self.selection_mode,
            selected_ids: self.selected_ids.iter().copied().collect(),
            active_id: self.active_result.as_ref().map(|m| m.id),
            library: self
                .library
                .iter()
                .map(|m| MediaInfo {
                    id: m.id,
                    kind: m.kind,
                    mime: m.mime.clone(),
                    prompt: m.prompt.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub file_name: String,
    pub mime: String,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub id: i64,
    pub kind: MediaKind,
    pub mime: String,
    pub prompt: String,
}

/// What the frontend renders; media payloads travel separately on demand.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub mode: Mode,
    pub studio_mode: StudioMode,
    pub aspect_ratio: &'static str,
    pub mixer: MixerWeights,
    pub selected_style: Option<String>,
    pub loading: bool,
    pub message: Option<AppMessage>,
    pub source1: Option<SourceInfo>,
    pub source2: Option<SourceInfo>,
    pub selection_mode: bool,
    pub selected_ids: Vec<i64>,
    pub active_id: Option<i64>,
    pub library: Vec<MediaInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str) -> SourceSlot {
        SourceSlot {
            bytes: vec![1, 2, 3],
            mime: "image/jpeg".to_string(),
            file_name: name.to_string(),
        }
    }

    #[test]
    fn mode_follows_slot_presence() {
        assert_eq!(resolve_mode(false, false), Mode::Generate);
        assert_eq!(resolve_mode(true, false), Mode::Edit);
        assert_eq!(resolve_mode(true, true), Mode::Recompose);
        // A lone style slot does not make an edit target.
        assert_eq!(resolve_mode(false, true), Mode::Generate);
    }

    #[test]
    fn mode_is_order_independent() {
        let mut a = SessionState::default();
        a.set_source(1, slot("a"));
        a.set_source(2, slot("b"));
        let mut b = SessionState::default();
        b.set_source(2, slot("b"));
        b.set_source(1, slot("a"));
        assert_eq!(a.mode(), Mode::Recompose);
        assert_eq!(b.mode(), Mode::Recompose);
    }

    #[test]
    fn aspect_ratio_change_resets_to_generate() {
        let mut st = SessionState::default();
        st.set_source(1, slot("a"));
        st.push_media(
            MediaKind::Image,
            vec![9],
            "image/png".to_string(),
            "p".to_string(),
        );
        assert_eq!(st.mode(), Mode::Edit);

        st.set_aspect_ratio(AspectRatio::Wide);
        assert!(st.source1.is_none());
        assert!(st.source2.is_none());
        assert!(st.active_result.is_none());
        assert_eq!(st.mode(), Mode::Generate);
        let message = st.message.expect("info message after clearing");
        assert_eq!(message.severity, Severity::Info);
        // Library keeps its history.
        assert_eq!(st.library.len(), 1);
    }

    #[test]
    fn aspect_ratio_same_value_is_a_noop() {
        let mut st = SessionState::default();
        st.set_source(1, slot("a"));
        st.set_aspect_ratio(AspectRatio::Square);
        assert!(st.source1.is_some());
        assert!(st.message.is_none());
    }

    #[test]
    fn uploading_slot1_clears_active_result_outside_recompose() {
        let mut st = SessionState::default();
        st.push_media(
            MediaKind::Image,
            vec![9],
            "image/png".to_string(),
            "p".to_string(),
        );
        st.set_source(1, slot("a"));
        assert!(st.active_result.is_none());

        // With both slots populated a re-upload keeps the active result.
        st.set_source(2, slot("b"));
        st.push_media(
            MediaKind::Image,
            vec![8],
            "image/png".to_string(),
            "q".to_string(),
        );
        st.set_source(1, slot("c"));
        assert!(st.active_result.is_some());
    }

    #[test]
    fn media_ids_are_unique_and_newest_first() {
        let mut st = SessionState::default();
        let a = st.push_media(MediaKind::Image, vec![1], "image/png".into(), "a".into());
        let b = st.push_media(MediaKind::Image, vec![2], "image/png".into(), "b".into());
        assert_ne!(a.id, b.id);
        assert_eq!(st.library[0].id, b.id);
        assert_eq!(st.library[1].id, a.id);
        assert_eq!(st.active_result.as_ref().map(|m| m.id), Some(b.id));
    }

    #[test]
    fn mixer_weights_are_clamped() {
        let w = MixerWeights::new(-5, 130, 50);
        assert_eq!(w.identity_preservation, 0);
        assert_eq!(w.style_mix, 100);
        assert_eq!(w.background_mix, 50);
    }

    #[test]
    fn style_selection_toggles() {
        let mut st = SessionState::default();
        st.toggle_style("anime-manga".to_string());
        assert_eq!(st.selected_style.as_deref(), Some("anime-manga"));
        st.toggle_style("anime-manga".to_string());
        assert!(st.selected_style.is_none());
    }

    #[test]
    fn selection_mode_toggle_resets_the_set() {
        let mut st = SessionState::default();
        st.toggle_selection_mode();
        st.toggle_media_selection(7);
        st.toggle_media_selection(9);
        st.toggle_media_selection(7);
        assert!(st.selected_ids.contains(&9));
        assert!(!st.selected_ids.contains(&7));
        st.toggle_selection_mode();
        assert!(st.selected_ids.is_empty());
        // Selections are ignored outside selection mode.
        st.toggle_media_selection(9);
        assert!(st.selected_ids.is_empty());
    }
}
