pub mod ytdlp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

pub use ytdlp::{ResolverConfig, YtDlpResolver};

/// Metadatos reproducibles de un track ya resuelto. Inmutable una vez
/// producido; los nombres serde coinciden con el formato del archivo de caché.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTrack {
    pub title: Option<String>,
    pub webpage_url: Option<String>,
    pub uploader: Option<String>,
    /// Único campo obligatorio: sin él no hay reproducción posible.
    pub stream_url: String,
}

/// Capacidad de extracción: convierte una URL de origen en un track
/// reproducible. Corre fuera del camino de planificación de la sesión.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<ResolvedTrack, ResolveError>;
}
