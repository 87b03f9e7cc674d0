// src/corpus/collect.rs
// One-time history collection: pages through the source user's posting
// history, cleans each item, and writes the per-identity corpus file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::platform::PlatformClient;

use super::CORPUS_HEADER;

/// Pause between history pages to respect platform rate limits.
const PAGE_DELAY: Duration = Duration::from_secs(2);

/// A page this full means more pages may follow.
const FULL_PAGE: usize = 100;

static LEADING_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@/?[a-zA-Z0-9_]+").expect("valid regex"));

// URLs, media-link markers, mentions, hashtags, and the non-breaking-space
// and ellipsis characters the platform embeds in post text.
static MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"http\S+|pic\.\S+|\u{a0}|…|@/?[a-zA-Z0-9_]+|#\S+").expect("valid regex"));

/// Download the source user's history into the corpus file at `path`.
/// Returns the number of items written.
pub async fn collect_history(
    client: &dyn PlatformClient,
    user_id: &str,
    path: &Path,
) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("failed to create corpus file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", CORPUS_HEADER)?;

    let mut written = 0;
    let mut page = client.fetch_history(user_id, None).await?;
    written += write_page(&mut writer, &page.items)?;

    if let Some(newest) = &page.newest_id {
        debug!("Newest history item: {}", newest);
    }

    while page.result_count >= FULL_PAGE {
        let Some(token) = page.next_page_token.clone() else {
            break;
        };
        tokio::time::sleep(PAGE_DELAY).await;
        page = client.fetch_history(user_id, Some(token.as_str())).await?;
        written += write_page(&mut writer, &page.items)?;
    }

    writer.flush()?;
    info!("Collected {} history items into {}", written, path.display());
    Ok(written)
}

fn write_page(writer: &mut impl Write, items: &[String]) -> Result<usize> {
    let mut written = 0;
    for item in items {
        let text = clean_text(item);
        if !text.is_empty() {
            writeln!(writer, "{}", text)?;
            written += 1;
        }
    }
    Ok(written)
}

/// Strip platform markup from a raw history item: every leading @-mention,
/// then URLs, media links, remaining mentions, hashtags, and the NBSP and
/// ellipsis characters. Line breaks are flattened to spaces so every item
/// stays a single corpus row.
pub fn clean_text(text: &str) -> String {
    let mut text = text.replace(['\r', '\n'], " ");
    while LEADING_MENTION.is_match(&text) {
        text = LEADING_MENTION.replace(&text, "").trim().to_string();
    }
    MARKUP.replace_all(&text, "").trim().to_string()
}
