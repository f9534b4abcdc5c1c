//! Best-effort featured-image generation.
//!
//! Shares the retry ladder with article generation but is never allowed to
//! block publication: every failure collapses to `None` at the component
//! boundary and the post simply goes out without a featured image.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::gemini::{BackendError, GeminiClient, IMAGE_MODEL, InlineImage};
use crate::retry::{Attempt, Retry, RetryPolicy, Transient};

/// Appended to every image prompt; the backend loves captioning otherwise.
const NEGATIVE_CONSTRAINTS: &str =
    "Do not include any text, letters, numbers, captions, or watermarks in the image.";

/// Decoded image bytes plus the MIME type the backend reported.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Seam over the image backend so the generator can be exercised with fakes.
pub trait ImageBackend {
    async fn generate(&self, prompt: &str) -> Result<InlineImage, BackendError>;
}

impl ImageBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<InlineImage, BackendError> {
        self.generate_image(IMAGE_MODEL, prompt).await
    }
}

#[derive(Debug, Error)]
enum ImageError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("image payload was not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl Transient for ImageError {
    fn is_transient(&self) -> bool {
        match self {
            ImageError::Backend(e) => e.is_transient(),
            ImageError::Decode(_) => true,
        }
    }
}

struct ImageAttempt<'a, B> {
    backend: &'a B,
    prompt: String,
}

impl<B: ImageBackend> Attempt for ImageAttempt<'_, B> {
    type Output = GeneratedImage;
    type Error = ImageError;

    async fn attempt(&self) -> Result<GeneratedImage, ImageError> {
        let payload = self.backend.generate(&self.prompt).await?;
        let bytes = STANDARD.decode(payload.data.as_bytes())?;
        Ok(GeneratedImage {
            bytes,
            mime_type: payload.mime_type,
        })
    }
}

/// Turns an image description into uploadable bytes, or nothing.
pub struct ImageGenerator<'a, B = GeminiClient> {
    backend: &'a B,
    policy: RetryPolicy,
}

impl<'a, B: ImageBackend> ImageGenerator<'a, B> {
    pub fn new(backend: &'a B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    #[instrument(level = "info", skip_all)]
    pub async fn generate_image(&self, description: &str) -> Option<GeneratedImage> {
        let attempt = ImageAttempt {
            backend: self.backend,
            prompt: format!("{description} {NEGATIVE_CONSTRAINTS}"),
        };

        match Retry::new(attempt, self.policy.clone()).run().await {
            Ok(image) => {
                info!(
                    bytes = image.bytes.len(),
                    mime_type = %image.mime_type,
                    "Image generated"
                );
                Some(image)
            }
            Err(e) => {
                warn!(error = %e, "Image generation failed; publishing without a featured image");
                None
            }
        }
    }
}

/// File extension for an uploaded media asset, from its MIME type.
pub fn file_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    }
}
