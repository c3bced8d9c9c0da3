use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::task::JoinHandle;

use crate::gemini::VisionService;
use crate::prompt::VIDEO_LOADING_MESSAGES;

pub const POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const MAX_POLLS: u32 = 30;
const ROTATE_INTERVAL: Duration = Duration::from_secs(4);
const DEFAULT_VIDEO_MIME: &str = "video/mp4";

pub type ProgressFn = Arc<dyn Fn(String) + Send + Sync>;

/// Cancels the wrapped task when dropped, so the message rotation never
/// outlives the job it narrates.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn spawn_rotation(progress: ProgressFn) -> AbortOnDrop {
    AbortOnDrop(tokio::spawn(async move {
        for message in VIDEO_LOADING_MESSAGES.iter().cycle() {
            progress((*message).to_string());
            tokio::time::sleep(ROTATE_INTERVAL).await;
        }
    }))
}

/// Polls the long-running operation until it reports done, waiting the
/// full interval before each status check.
async fn poll_until_done(
    service: &dyn VisionService,
    operation: &str,
    interval: Duration,
    max_polls: u32,
) -> Result<Option<String>> {
    for _ in 0..max_polls {
        tokio::time::sleep(interval).await;
        let status = service.poll_video(operation).await?;
        if status.done {
            return Ok(status.uri);
        }
    }
    Err(anyhow!("Video generation timed out. Please try again."))
}

/// Runs a full video job: start, poll to completion, download. Emits
/// rotating flavor text until the download phase takes over.
pub async fn generate_video(
    service: &dyn VisionService,
    image: &[u8],
    mime: &str,
    prompt: &str,
    progress: ProgressFn,
) -> Result<(Vec<u8>, String)> {
    let rotation = spawn_rotation(progress.clone());

    let operation = service.start_video(image, mime, prompt).await?;
    let uri = poll_until_done(service, &operation, POLL_INTERVAL, MAX_POLLS).await?;

    drop(rotation);
    progress("Downloading your video...".to_string());

    let uri = uri.ok_or_else(|| {
        anyhow!("The service returned no video. The prompt may have been rejected.")
    })?;
    let (bytes, content_type) = service.download(&uri).await?;
    Ok((bytes, content_type.unwrap_or_else(|| DEFAULT_VIDEO_MIME.to_string())))
}
