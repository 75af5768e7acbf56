use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::prefetch::PrefetchHandle;
use crate::sources::ResolvedTrack;

/// Identificador opaco de la sala; el host decide qué significa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

/// Referencia opaca a quien pidió la pista. El core nunca la
/// interpreta; solo la devuelve en los eventos de notificación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequesterId(pub u64);

/// Una petición pendiente. Se consume al volverse la pista activa y se
/// descarta por completo cuando su reproducción termina.
#[derive(Debug)]
pub struct QueueEntry {
    pub url: String,
    pub requested_by: RequesterId,
    /// Resolución en vuelo, si alguien la arrancó.
    pub prefetch: Option<PrefetchHandle>,
    /// Metadatos ya materializados durante el encolado.
    pub resolved: Option<ResolvedTrack>,
    pub added_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(url: String, requested_by: RequesterId) -> Self {
        Self {
            url,
            requested_by,
            prefetch: None,
            resolved: None,
            added_at: Utc::now(),
        }
    }
}

/// Vista de solo lectura de una entrada, para listar la cola.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItemInfo {
    /// Posición en la cola, base 1.
    pub position: usize,
    pub url: String,
    pub requested_by: RequesterId,
    pub added_at: DateTime<Utc>,
}

pub(crate) fn snapshot(queue: &VecDeque<QueueEntry>) -> Vec<QueueItemInfo> {
    queue
        .iter()
        .enumerate()
        .map(|(index, entry)| QueueItemInfo {
            position: index + 1,
            url: entry.url.clone(),
            requested_by: entry.requested_by,
            added_at: entry.added_at,
        })
        .collect()
}
