use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::image_store::MemoryImageStore;
use crate::room_manager::RoomManager;

pub type SharedRoomManager = Arc<RwLock<RoomManager>>;

#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomManager,
    pub images: Arc<MemoryImageStore>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub started_at: Instant,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let images = Arc::new(MemoryImageStore::new(
            config.limits.max_image_bytes,
            config.limits.max_image_store_bytes,
        ));
        Self {
            rooms: Arc::new(RwLock::new(RoomManager::new())),
            images,
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            started_at: Instant::now(),
            config: Arc::new(config),
        }
    }
}

/// RAII guard that decrements the WS connection counter on drop, so the
/// count stays accurate across every disconnect path.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}
