//! Image download and validation, the final step of a successful crawl.

use sha2::{Digest, Sha256};

use crate::crawler::CrawlSession;
use crate::error::{CrawlError, CrawlResult};

/// Download an image and return the SHA-256 checksum of its bytes.
///
/// The response must carry an `image/*` content type; comic sites that have
/// reorganized tend to answer image URLs with HTML error pages and a 200.
pub async fn image_checksum(session: &CrawlSession, url: &str) -> CrawlResult<String> {
    let (content_type, bytes) = session.get_bytes(url).await?;
    match &content_type {
        Some(value) if value.starts_with("image/") => {}
        _ => {
            return Err(CrawlError::NotAnImage {
                url: url.to_string(),
                content_type,
            });
        }
    }
    Ok(sha256_hex(&bytes))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
