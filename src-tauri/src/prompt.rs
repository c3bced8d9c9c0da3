use crate::state::MixerWeights;

/// Closed lookup table of style presets. Unknown ids contribute nothing.
pub const ENHANCEMENT_PROMPTS: &[(&str, &str)] = &[
    (
        "photorealistic",
        "photorealistic, 8k, ultra-detailed, sharp focus",
    ),
    (
        "figure",
        "3d model, toy figure, miniature, detailed textures, studio lighting",
    ),
    (
        "profile",
        "professional profile picture, portrait, studio lighting, high resolution",
    ),
    (
        "drawing",
        "charcoal drawing, sketch, detailed lines, artistic shading",
    ),
    (
        "poster",
        "movie poster, graphic design, bold typography, vibrant colors",
    ),
    (
        "watercolor",
        "watercolor painting, wet-on-wet technique, soft edges, pastel colors",
    ),
    (
        "oil-painting",
        "oil painting, thick brush strokes, impasto style, rich colors",
    ),
    (
        "cinematic",
        "cinematic shot, dramatic lighting, movie still, anamorphic lens flare",
    ),
    (
        "anime-manga",
        "anime style, manga, key visual, vibrant, dynamic lines",
    ),
];

/// Magic tool buttons: enhancement and expression presets applied to a result.
pub const MAGIC_TOOL_PROMPTS: &[(&str, &str)] = &[
    (
        "upscale",
        "Upscale to 4k resolution, enhance details, sharpen image",
    ),
    (
        "pretty",
        "Enhance the subject's beauty with a focus on natural, glowing skin, subtle and elegant makeup, and soft, flattering lighting. If appropriate, add a simple, tasteful accessory like a small earring or a delicate necklace to complement the look. Make the overall atmosphere more dreamy and aesthetically pleasing.",
    ),
    (
        "cool",
        "Transform the subject to look cooler and more stylish. Give them a confident expression, add dynamic, high-contrast lighting, and sharpen the details. If appropriate, add a suitable accessory like modern sunglasses or a leather jacket. The overall mood should be more edgy and dynamic.",
    ),
    ("joy", "Change the expression to joyful and happy 😊"),
    ("sadness", "Change the expression to sad and melancholic 😢"),
    ("anger", "Change the expression to angry and furious 😠"),
    ("neutral", "Change the expression to a neutral, calm look 😐"),
];

pub const INSPIRATION_PROMPTS: &[&str] = &[
    "For a profile picture, shot under soft studio lighting",
    "Turn me into an elf character from a fantasy world, with pointed ears and a mystical forest backdrop",
    "An 80s retro style portrait with neon lighting and a vintage jacket",
    "A cute animated caricature to use as a social media avatar",
    "A dramatic black-and-white portrait with striking contrast",
    "Reimagine me as a superhero wearing a custom costume",
    "A cozy autumn-themed portrait, wearing a warm sweater and holding a coffee cup",
    "Cyberpunk style with robotic parts and a futuristic city in the background",
    "A portrait painted in the style of Vincent van Gogh",
    "Draw my face as minimal line art",
];

/// Flavor text shown while a video job is in flight, cycled on a timer.
pub const VIDEO_LOADING_MESSAGES: &[&str] = &[
    "Warming up the animation engine...",
    "Sketching the persona's keyframes...",
    "Consulting the digital director of photography...",
    "Rendering the first few seconds of motion...",
    "Applying advanced visual effects...",
    "Polishing the final frames...",
    "Almost there. Get ready for the premiere!",
];

pub const EDIT_SYSTEM_INSTRUCTION: &str = "You are an expert photo editor. Your task is to modify the given image based on the user's text prompt.
Key instructions:
- **Preserve Identity**: You MUST preserve the subject's core identity, facial features, and body pose. Do not change the person into someone else.
- **Maintain Composition**: Keep the original image's composition, framing, and angle.
- **Background Consistency**: Retain the background unless the prompt specifically asks to change it.
- **Apply Edits Subtly**: Apply the requested changes (e.g., 'add a hat', 'change hair color') naturally and realistically, integrating them into the original image's style.";

pub const RECOMPOSE_SYSTEM_INSTRUCTION: &str = "You are an expert at image recomposition. Your task is to combine two images based on a user's prompt.
- The **first image** contains the primary subject (e.g., a person). You MUST preserve the identity, features, and pose of this subject.
- The **second image** provides the artistic style, color palette, and background.
- Your goal is to seamlessly transfer the subject from the first image into the style and environment of the second image.
- The user's text prompt provides additional creative direction for this combination.";

pub fn style_enhancement(style_id: &str) -> Option<&'static str> {
    ENHANCEMENT_PROMPTS
        .iter()
        .find(|(id, _)| *id == style_id)
        .map(|(_, phrase)| *phrase)
}

pub fn magic_tool_prompt(tool_id: &str) -> Option<&'static str> {
    MAGIC_TOOL_PROMPTS
        .iter()
        .find(|(id, _)| *id == tool_id)
        .map(|(_, phrase)| *phrase)
}

/// Age instruction for a nonzero delta. Zero is a reset sentinel handled
/// by the orchestrator and never reaches prompt assembly.
pub fn age_prompt(delta: i32) -> String {
    let direction = if delta > 0 { "older" } else { "younger" };
    format!(
        "Make the person look {} years {}, while keeping the original style.",
        delta.abs(),
        direction
    )
}

/// Assembles the dual-image instruction. Clause order is deliberate and
/// fixed: identity, style blend, background blend, user hint, preset.
pub fn recompose_prompt(mixer: MixerWeights, user_text: &str, style_id: Option<&str>) -> String {
    let identity = format!(
        "The subject's core identity and facial features from the first image should be preserved with {}% strength. A lower percentage allows for more fusion with the features from the second image.",
        mixer.identity_preservation
    );
    let style = format!(
        "The final artistic style should be a blend, taking {}% from the second image's style and {}% from the first image's style.",
        mixer.style_mix,
        100 - mixer.style_mix
    );
    let background = format!(
        "The background should be a blend, taking {}% from the second image's background and {}% from the first image's background.",
        mixer.background_mix,
        100 - mixer.background_mix
    );
    let user_hint = if user_text.trim().is_empty() {
        "Create a seamless and realistic blend.".to_string()
    } else {
        format!("An additional user instruction: \"{}\"", user_text)
    };

    let mut prompt = format!(
        "You are an expert image mixer. Combine the two provided images according to these rules:\n1. {identity}\n2. {style}\n3. {background}\n{user_hint}"
    );
    if let Some(enhancement) = style_id.and_then(style_enhancement) {
        prompt.push_str(&format!(
            "\nAdditionally, render the final image in a {enhancement} style."
        ));
    }
    prompt
}

/// Single-image edit instruction; first match wins. `None` means the
/// user gave us nothing to apply.
pub fn edit_prompt(
    override_prompt: Option<&str>,
    age_delta: Option<i32>,
    style_id: Option<&str>,
    free_text: &str,
) -> Option<String> {
    if let Some(p) = override_prompt.filter(|p| !p.trim().is_empty()) {
        return Some(p.to_string());
    }
    if let Some(delta) = age_delta.filter(|d| *d != 0) {
        return Some(age_prompt(delta));
    }
    if let Some(enhancement) = style_id.and_then(style_enhancement) {
        return Some(format!("{free_text}, {enhancement}"));
    }
    if !free_text.trim().is_empty() {
        return Some(free_text.to_string());
    }
    None
}

/// Text-to-image instruction: free text plus the optional preset phrase.
pub fn generate_prompt(free_text: &str, style_id: Option<&str>) -> String {
    match style_id.and_then(style_enhancement) {
        Some(enhancement) => format!("{free_text}, {enhancement}"),
        None => free_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixer(identity: i64, style: i64, background: i64) -> MixerWeights {
        MixerWeights::new(identity, style, background)
    }

    #[test]
    fn recompose_clauses_keep_their_order() {
        let prompt = recompose_prompt(mixer(80, 30, 50), "", None);
        let identity = prompt
            .find("preserved with 80% strength")
            .expect("identity clause");
        let style = prompt
            .find("taking 30% from the second image's style and 70% from the first image's style")
            .expect("style clause");
        let background = prompt
            .find("taking 50% from the second image's background and 50% from the first image's background")
            .expect("background clause");
        let fallback = prompt
            .find("Create a seamless and realistic blend.")
            .expect("fallback clause");
        assert!(identity < style && style < background && background < fallback);
    }

    #[test]
    fn recompose_quotes_user_text_and_appends_preset_last() {
        let prompt = recompose_prompt(mixer(100, 100, 100), "swap the hats", Some("cinematic"));
        let hint = prompt
            .find("An additional user instruction: \"swap the hats\"")
            .expect("user hint");
        let preset = prompt
            .find("Additionally, render the final image in a cinematic shot, dramatic lighting, movie still, anamorphic lens flare style.")
            .expect("preset clause");
        assert!(hint < preset);
        assert!(!prompt.contains("seamless and realistic"));
    }

    #[test]
    fn edit_prompt_resolution_order() {
        // Override wins over everything else.
        assert_eq!(
            edit_prompt(Some("sharpen"), Some(10), Some("poster"), "hello"),
            Some("sharpen".to_string())
        );
        // Then the age modifier.
        assert_eq!(
            edit_prompt(None, Some(-5), Some("poster"), "hello"),
            Some("Make the person look 5 years younger, while keeping the original style.".to_string())
        );
        // Then the preset concatenated with free text.
        assert_eq!(
            edit_prompt(None, None, Some("anime-manga"), "a windy rooftop"),
            Some("a windy rooftop, anime style, manga, key visual, vibrant, dynamic lines".to_string())
        );
        // Then free text alone.
        assert_eq!(
            edit_prompt(None, None, None, "add a red hat"),
            Some("add a red hat".to_string())
        );
        // Nothing to apply.
        assert_eq!(edit_prompt(None, None, None, "   "), None);
    }

    #[test]
    fn unknown_style_contributes_nothing() {
        assert_eq!(style_enhancement("vaporwave"), None);
        assert_eq!(
            edit_prompt(None, None, Some("vaporwave"), "keep it"),
            Some("keep it".to_string())
        );
        assert_eq!(generate_prompt("a cat", Some("vaporwave")), "a cat");
    }

    #[test]
    fn age_prompt_wording() {
        assert_eq!(
            age_prompt(12),
            "Make the person look 12 years older, while keeping the original style."
        );
        assert_eq!(
            age_prompt(-30),
            "Make the person look 30 years younger, while keeping the original style."
        );
    }

    #[test]
    fn zero_age_is_not_an_edit() {
        // A reset slider plus nothing else resolves to "nothing to apply".
        assert_eq!(edit_prompt(None, Some(0), None, ""), None);
    }

    #[test]
    fn generate_prompt_appends_preset() {
        assert_eq!(
            generate_prompt("a lighthouse at dawn", Some("watercolor")),
            "a lighthouse at dawn, watercolor painting, wet-on-wet technique, soft edges, pastel colors"
        );
    }
}
