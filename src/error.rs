use thiserror::Error;

/// Errores de validación del motor de cola. Solo se reportan al
/// solicitante; nunca mutan el estado de la sesión.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("URL no permitida: {0}")]
    DisallowedUrl(String),

    #[error("el sink de audio no está disponible")]
    SinkUnavailable,
}

/// Fallos de extracción de metadatos (red, extractor, geo-bloqueo,
/// salida malformada). El que llama decide la política de reintento.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no se pudo ejecutar yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("extracción fallida: {0}")]
    Extraction(String),

    #[error("salida del extractor inválida: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("la extracción no produjo stream_url")]
    MissingStreamUrl,
}
