use async_trait::async_trait;

use crate::audio::queue::RequesterId;
use crate::sources::ResolvedTrack;

/// Evento estructurado que el motor entrega al notificador. El core
/// aporta datos, nunca mensajes formateados; el host decide el render.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    NowPlaying {
        track: ResolvedTrack,
        requested_by: RequesterId,
    },
    Queued {
        url: String,
        /// Posición en la cola, base 1.
        position: usize,
        /// Metadatos si la caché ya los tenía; el host puede completar.
        title: Option<String>,
        uploader: Option<String>,
        requested_by: RequesterId,
    },
    Skipped {
        /// La pista que estaba sonando, si el motor la conocía.
        track: Option<ResolvedTrack>,
    },
    Stopped,
    PlaybackFailed {
        url: String,
        requested_by: RequesterId,
    },
}

/// Capacidad de notificación inyectada por el host. Sus fallas se
/// registran y jamás bloquean ni revierten una transición de la cola.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: QueueEvent) -> anyhow::Result<()>;
}
