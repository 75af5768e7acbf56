//! Caché en disco de resoluciones de prefetch.
//!
//! Un único objeto JSON por archivo: clave canónica de video ->
//! `{timestamp, data}`. Las entradas expiran por TTL con desigualdad
//! estricta y toda falla de IO se degrada a "sin caché": un archivo
//! corrupto o ausente se lee como mapa vacío y una escritura fallida
//! solo se registra, nunca llega al motor de cola.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::sources::ResolvedTrack;

/// Registro persistido: metadatos resueltos más el momento de resolución.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Segundos desde epoch en que se resolvió la entrada.
    pub timestamp: u64,
    pub data: ResolvedTrack,
}

pub struct PrefetchCache {
    path: PathBuf,
    ttl: Duration,
    // serializa el ciclo leer-modificar-escribir sobre el archivo
    write_lock: Mutex<()>,
}

impl PrefetchCache {
    /// Abre la caché y purga las entradas expiradas (pasada inicial).
    pub async fn open(path: PathBuf, ttl: Duration) -> Self {
        let cache = Self {
            path,
            ttl,
            write_lock: Mutex::new(()),
        };
        cache.purge_expired().await;
        cache
    }

    /// Devuelve el track solo si la entrada existe y no expiró.
    pub async fn get(&self, key: &str) -> Option<ResolvedTrack> {
        let records = self.load_all().await;
        let record = records.get(key)?;
        is_fresh(record.timestamp, now_secs(), self.ttl).then(|| record.data.clone())
    }

    /// Inserta o reemplaza la entrada para la clave. Una escritura
    /// perdida degrada el rendimiento, no la corrección.
    pub async fn put(&self, key: &str, track: &ResolvedTrack) {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load_all().await;
        records.insert(
            key.to_string(),
            CacheRecord {
                timestamp: now_secs(),
                data: track.clone(),
            },
        );
        self.save_all(&records).await;
    }

    /// Elimina toda entrada expirada; reescribe el archivo solo si
    /// realmente borró algo.
    pub async fn purge_expired(&self) {
        let _guard = self.write_lock.lock().await;
        let records = self.load_all().await;
        let now = now_secs();

        let fresh: HashMap<String, CacheRecord> = records
            .iter()
            .filter(|(_, record)| is_fresh(record.timestamp, now, self.ttl))
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect();

        if fresh.len() != records.len() {
            info!(
                "🧹 Caché: purgadas {} entradas expiradas",
                records.len() - fresh.len()
            );
            self.save_all(&fresh).await;
        }
    }

    async fn load_all(&self) -> HashMap<String, CacheRecord> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("Caché ilegible en {}: {}", self.path.display(), e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        }
    }

    async fn save_all(&self, records: &HashMap<String, CacheRecord>) {
        let json = match serde_json::to_vec(records) {
            Ok(json) => json,
            Err(e) => {
                warn!("No se pudo serializar la caché: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, json).await {
            warn!("No se pudo escribir la caché en {}: {}", self.path.display(), e);
        }
    }
}

fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Un registro es válido mientras `now - timestamp < ttl` (estricto).
fn is_fresh(timestamp: u64, now: u64, ttl: Duration) -> bool {
    now.saturating_sub(timestamp) < ttl.as_secs()
}

/// Deriva la clave canónica de caché (ID de video) desde una URL.
///
/// Sin patrón reconocible no hay clave: esa URL se resuelve directo,
/// sin pasar por la caché.
pub fn derive_cache_key(url: &str) -> Option<String> {
    if let Some((_, rest)) = url.split_once("v=") {
        let id = rest.split('&').next().unwrap_or(rest);
        return (!id.is_empty()).then(|| id.to_string());
    }
    if let Some((_, rest)) = url.split_once("youtu.be/") {
        let id = rest.split('?').next().unwrap_or(rest);
        return (!id.is_empty()).then(|| id.to_string());
    }
    None
}
