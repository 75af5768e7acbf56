use async_trait::async_trait;
use tokio::sync::oneshot;

/// Resultado con que termina una reproducción.
pub type PlaybackResult = Result<(), PlaybackError>;

/// Canal de terminación: el sink envía exactamente una señal por cada
/// llamada a `play`, tanto en éxito como en error.
pub type PlaybackDone = oneshot::Receiver<PlaybackResult>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fallo de reproducción: {0}")]
pub struct PlaybackError(pub String);

/// Transporte de audio inyectado por el host (típicamente un canal de
/// voz ya conectado a la sala de la sesión).
///
/// `play` devuelve el canal one-shot que se completa cuando la pista
/// termina o falla; el motor avanza la cola al recibir esa señal. Si el
/// sink descarta el extremo emisor, el motor lo trata como pista
/// terminada.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn play(&self, stream_url: &str) -> anyhow::Result<PlaybackDone>;
    async fn stop(&self);
    async fn disconnect(&self);
    async fn set_volume(&self, volume: f32) -> anyhow::Result<()>;
    async fn is_connected(&self) -> bool;
    async fn is_playing(&self) -> bool;
}
