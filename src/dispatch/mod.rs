// src/dispatch/mod.rs
// Formats one accepted candidate and hands it to the posting endpoint.

use std::sync::Arc;

use tracing::{error, info};
use unicode_normalization::UnicodeNormalization;

use crate::platform::PlatformClient;

/// Hard character cap applied after normalization.
pub const MAX_POST_CHARS: usize = 279;

pub struct Dispatcher {
    client: Arc<dyn PlatformClient>,
    enabled: bool,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn PlatformClient>, enabled: bool) -> Self {
        Self { client, enabled }
    }

    /// Prepare `text` and, if posting is enabled, submit it. A rejected or
    /// failed post is logged and dropped; it never propagates an error, so
    /// a flaky endpoint cannot stall the cadence.
    pub async fn send(&self, text: &str) {
        let text = prepare(text);
        info!("Post prepared: {}", text);

        if !self.enabled {
            info!("Posting is not enabled. Post not sent");
            return;
        }

        if let Err(e) = self.client.create_post(&finalize(&text)).await {
            error!("Failed to publish post: {:#}", e);
        }
    }
}

/// Replace platform markup characters before submission.
fn prepare(text: &str) -> String {
    text.replace('#', "hashtag ")
}

/// Unicode canonical composition, then hard truncation to the length cap.
fn finalize(text: &str) -> String {
    text.nfc().collect::<String>().chars().take(MAX_POST_CHARS).collect()
}
