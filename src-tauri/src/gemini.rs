use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::StreamExt;
use serde_json::{json, Value};

use crate::prompt::{EDIT_SYSTEM_INSTRUCTION, RECOMPOSE_SYSTEM_INSTRUCTION};
use crate::state::AspectRatio;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const EDIT_MODEL: &str = "gemini-2.5-flash-image-preview";
const TEXT_TO_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
const VIDEO_MODEL: &str = "veo-2.0-generate-001";

/// What a conditioned or unconditioned image call came back with. A
/// missing image is not a transport error; the orchestrator decides how
/// to surface it.
pub struct ImageResult {
    pub image: Option<(Vec<u8>, String)>,
    pub text: Option<String>,
}

pub struct VideoOperation {
    pub done: bool,
    pub uri: Option<String>,
}

/// The remote generation surface, abstracted so the orchestrator and the
/// video poller can be driven by a test double.
#[async_trait]
pub trait VisionService: Send + Sync {
    async fn edit_image(&self, image: &[u8], mime: &str, prompt: &str) -> Result<ImageResult>;

    async fn recompose_images(
        &self,
        image1: &[u8],
        mime1: &str,
        image2: &[u8],
        mime2: &str,
        prompt: &str,
    ) -> Result<ImageResult>;

    async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio)
        -> Result<ImageResult>;

    /// Kicks off an asynchronous video job and returns its operation name.
    async fn start_video(&self, image: &[u8], mime: &str, prompt: &str) -> Result<String>;

    async fn poll_video(&self, operation: &str) -> Result<VideoOperation>;

    /// Fetches a finished artifact, returning its bytes and content type.
    async fn download(&self, uri: &str) -> Result<(Vec<u8>, Option<String>)>;
}

/// REST client for the Generative Language API. Constructed once at
/// startup and injected into the orchestrator.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(anyhow!("Gemini API key is empty"));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
        })
    }

    fn inline_part(image: &[u8], mime: &str) -> Value {
        json!({ "inlineData": { "data": BASE64.encode(image), "mimeType": mime } })
    }

    async fn generate_content(&self, parts: Vec<Value>, system: &str) -> Result<ImageResult> {
        let url = format!("{API_BASE}/models/{EDIT_MODEL}:generateContent");
        let body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] },
            "systemInstruction": { "parts": [{ "text": system }] },
        });
        let resp = self
            .http
            .post(&url)
            .header("X-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("image request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("image service error: HTTP {}", resp.status()));
        }
        let value: Value = resp.json().await.context("image response parse error")?;
        parse_image_response(&value)
    }
}

#[async_trait]
impl VisionService for GeminiClient {
    async fn edit_image(&self, image: &[u8], mime: &str, prompt: &str) -> Result<ImageResult> {
        let parts = vec![Self::inline_part(image, mime), json!({ "text": prompt })];
        self.generate_content(parts, EDIT_SYSTEM_INSTRUCTION).await
    }

    async fn recompose_images(
        &self,
        image1: &[u8],
        mime1: &str,
        image2: &[u8],
        mime2: &str,
        prompt: &str,
    ) -> Result<ImageResult> {
        // Images first, then the text prompt, for better model interpretation.
        let parts = vec![
            Self::inline_part(image1, mime1),
            Self::inline_part(image2, mime2),
            json!({ "text": prompt }),
        ];
        self.generate_content(parts, RECOMPOSE_SYSTEM_INSTRUCTION)
            .await
    }

    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<ImageResult> {
        let url = format!("{API_BASE}/models/{TEXT_TO_IMAGE_MODEL}:predict");
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": aspect_ratio.id(),
                "outputMimeType": "image/png",
            },
        });
        let resp = self
            .http
            .post(&url)
            .header("X-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("image generation request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("image service error: HTTP {}", resp.status()));
        }
        let value: Value = resp
            .json()
            .await
            .context("image generation parse error")?;

        let image = match value
            .pointer("/predictions/0/bytesBase64Encoded")
            .and_then(Value::as_str)
        {
            Some(data) => {
                let bytes = BASE64
                    .decode(data)
                    .context("generated image payload is not valid base64")?;
                let mime = value
                    .pointer("/predictions/0/mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or("image/png")
                    .to_string();
                Some((bytes, mime))
            }
            None => None,
        };
        Ok(ImageResult { image, text: None })
    }

    async fn start_video(&self, image: &[u8], mime: &str, prompt: &str) -> Result<String> {
        let url = format!("{API_BASE}/models/{VIDEO_MODEL}:predictLongRunning");
        let body = json!({
            "instances": [{
                "prompt": prompt,
                "image": { "bytesBase64Encoded": BASE64.encode(image), "mimeType": mime },
            }],
            "parameters": { "sampleCount": 1 },
        });
        let resp = self
            .http
            .post(&url)
            .header("X-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("video request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("video service error: HTTP {}", resp.status()));
        }
        let value: Value = resp.json().await.context("video response parse error")?;
        value
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("video service returned no operation name"))
    }

    async fn poll_video(&self, operation: &str) -> Result<VideoOperation> {
        let url = format!("{API_BASE}/{operation}");
        let resp = self
            .http
            .get(&url)
            .header("X-goog-api-key", &self.api_key)
            .send()
            .await
            .context("video status request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("video status error: HTTP {}", resp.status()));
        }
        let value: Value = resp.json().await.context("video status parse error")?;
        let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);
        // The REST shape nests samples; older responses used generatedVideos.
        let uri = value
            .pointer("/response/generateVideoResponse/generatedSamples/0/video/uri")
            .or_else(|| value.pointer("/response/generatedVideos/0/video/uri"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(VideoOperation { done, uri })
    }

    async fn download(&self, uri: &str) -> Result<(Vec<u8>, Option<String>)> {
        let resp = self
            .http
            .get(uri)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .context("download request failed")?;
        if !resp.status().is_success() {
            return Err(anyhow!("download failed: HTTP {}", resp.status()));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("download stream error")?;
            bytes.extend_from_slice(&chunk);
        }
        Ok((bytes, content_type))
    }
}

/// Pulls the text and inline-image parts out of a generateContent response.
fn parse_image_response(value: &Value) -> Result<ImageResult> {
    let mut image = None;
    let mut text = None;
    if let Some(parts) = value
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
    {
        for part in parts {
            if let Some(t) = part.get("text").and_then(Value::as_str) {
                text = Some(t.to_string());
            } else if let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
            {
                let mime = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .unwrap_or("image/png")
                    .to_string();
                if let Some(data) = inline.get("data").and_then(Value::as_str) {
                    let bytes = BASE64
                        .decode(data)
                        .context("inline image payload is not valid base64")?;
                    image = Some((bytes, mime));
                }
            }
        }
    }
    Ok(ImageResult { image, text })
}
