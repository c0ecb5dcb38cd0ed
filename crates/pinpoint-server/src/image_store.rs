use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Content types accepted for uploads.
const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ImageStoreError {
    Empty,
    TooLarge(usize),
    UnsupportedType(String),
    StoreFull,
}

impl std::fmt::Display for ImageStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "image data is empty"),
            Self::TooLarge(size) => write!(f, "image too large: {size} bytes"),
            Self::UnsupportedType(t) => write!(f, "unsupported content type: {t}"),
            Self::StoreFull => write!(f, "image store is full"),
        }
    }
}

impl std::error::Error for ImageStoreError {}

/// In-memory image storage. Room sessions insert on upload and remove on
/// teardown; clients fetch over HTTP at the URL embedded in ShowImage.
pub struct MemoryImageStore {
    images: RwLock<HashMap<String, StoredImage>>,
    total_bytes: AtomicUsize,
    max_image_bytes: usize,
    max_total_bytes: usize,
}

impl MemoryImageStore {
    pub fn new(max_image_bytes: usize, max_total_bytes: usize) -> Self {
        Self {
            images: RwLock::new(HashMap::new()),
            total_bytes: AtomicUsize::new(0),
            max_image_bytes,
            max_total_bytes,
        }
    }

    /// Store an image, returning its id.
    pub async fn insert(
        &self,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ImageStoreError> {
        if data.is_empty() {
            return Err(ImageStoreError::Empty);
        }
        if data.len() > self.max_image_bytes {
            return Err(ImageStoreError::TooLarge(data.len()));
        }
        if !ALLOWED_TYPES.contains(&content_type) {
            return Err(ImageStoreError::UnsupportedType(content_type.to_string()));
        }

        let size = data.len();
        let mut images = self.images.write().await;
        // Check capacity under the write lock so concurrent inserts can't
        // both pass.
        if self.total_bytes.load(Ordering::Relaxed) + size > self.max_total_bytes {
            return Err(ImageStoreError::StoreFull);
        }
        let id = Uuid::new_v4().to_string();
        images.insert(
            id.clone(),
            StoredImage {
                data: Bytes::from(data),
                content_type: content_type.to_string(),
            },
        );
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Option<StoredImage> {
        self.images.read().await.get(id).cloned()
    }

    /// Remove an image. No-op if the id is unknown.
    pub async fn remove(&self, id: &str) {
        let mut images = self.images.write().await;
        if let Some(img) = images.remove(id) {
            self.total_bytes.fetch_sub(img.data.len(), Ordering::Relaxed);
        }
    }

    /// Serving path for a stored image.
    pub fn url_for(id: &str) -> String {
        format!("/images/{id}")
    }
}

/// GET /images/{id} — serve a stored image with its content type.
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let img = state
        .images
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("no image with id {id}")))?;
    Ok((
        [
            (header::CONTENT_TYPE, img.content_type),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
        ],
        img.data,
    )
        .into_response())
}
