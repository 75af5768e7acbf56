use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{derive_cache_key, PrefetchCache};
use crate::sources::{ResolvedTrack, TrackResolver};

/// Resolución especulativa de metadatos: caché primero, extractor después.
///
/// Nunca propaga errores del resolver hacia el motor de cola: un fallo
/// de extracción se registra y se convierte en `None`.
#[derive(Clone)]
pub struct Prefetcher {
    cache: Arc<PrefetchCache>,
    resolver: Arc<dyn TrackResolver>,
}

impl Prefetcher {
    pub fn new(cache: Arc<PrefetchCache>, resolver: Arc<dyn TrackResolver>) -> Self {
        Self { cache, resolver }
    }

    /// Lanza la resolución en segundo plano. El handle puede abandonarse:
    /// la tarea corre hasta terminar y su resultado simplemente no se usa,
    /// sin interrumpir al resolver compartido.
    pub fn spawn(&self, url: &str) -> PrefetchHandle {
        let prefetcher = self.clone();
        let url = url.to_string();
        PrefetchHandle {
            task: tokio::spawn(async move { prefetcher.fetch(&url).await }),
        }
    }

    /// Camino en línea: consulta la caché y, si no hay entrada fresca,
    /// resuelve y almacena (salvo que la URL no tenga clave derivable).
    pub async fn fetch(&self, url: &str) -> Option<ResolvedTrack> {
        let key = derive_cache_key(url);

        if let Some(key) = &key {
            if let Some(track) = self.cache.get(key).await {
                debug!("🎯 Prefetch servido desde caché: {}", key);
                return Some(track);
            }
        }

        match self.resolver.resolve(url).await {
            Ok(track) => {
                if let Some(key) = &key {
                    self.cache.put(key, &track).await;
                }
                Some(track)
            }
            Err(e) => {
                warn!("Prefetch falló para {}: {}", url, e);
                None
            }
        }
    }

    /// Mirada solo-caché, sin disparar ninguna resolución.
    pub async fn peek(&self, url: &str) -> Option<ResolvedTrack> {
        let key = derive_cache_key(url)?;
        self.cache.get(&key).await
    }
}

/// Referencia a una resolución en vuelo. El motor de cola es dueño del
/// handle; la tarea de fondo es dueña del cómputo.
#[derive(Debug)]
pub struct PrefetchHandle {
    task: JoinHandle<Option<ResolvedTrack>>,
}

impl PrefetchHandle {
    /// Espera el resultado. Un panic o cancelación de la tarea se
    /// reporta como ausencia de datos, nunca como error.
    pub async fn wait(self) -> Option<ResolvedTrack> {
        self.task.await.unwrap_or(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::sources::MockTrackResolver;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn track() -> ResolvedTrack {
        ResolvedTrack {
            title: Some("Canción".to_string()),
            webpage_url: Some("https://youtube.com/watch?v=ABC".to_string()),
            uploader: Some("Canal".to_string()),
            stream_url: "https://cdn.example/abc".to_string(),
        }
    }

    async fn cache() -> (tempfile::TempDir, Arc<PrefetchCache>) {
        let dir = tempfile::tempdir().unwrap();
        let cache =
            Arc::new(PrefetchCache::open(dir.path().join("c.json"), Duration::from_secs(60)).await);
        (dir, cache)
    }

    #[tokio::test]
    async fn cache_hit_completes_without_resolver() {
        let (_dir, cache) = cache().await;
        cache.put("ABC", &track()).await;

        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().times(0);

        let prefetcher = Prefetcher::new(cache, Arc::new(resolver));
        let got = prefetcher.fetch("https://youtube.com/watch?v=ABC").await;
        assert_eq!(got, Some(track()));
    }

    #[tokio::test]
    async fn miss_resolves_once_and_stores() {
        let (_dir, cache) = cache().await;
        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_| Ok(track()));

        let prefetcher = Prefetcher::new(cache, Arc::new(resolver));
        let url = "https://youtube.com/watch?v=ABC";

        assert_eq!(prefetcher.fetch(url).await, Some(track()));
        // la segunda lectura sale de la caché; times(1) lo verifica
        assert_eq!(prefetcher.fetch(url).await, Some(track()));
        assert_eq!(prefetcher.peek(url).await, Some(track()));
    }

    #[tokio::test]
    async fn resolver_failure_becomes_absent() {
        let (_dir, cache) = cache().await;
        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_| Err(ResolveError::Extraction("geo bloqueado".to_string())));

        let prefetcher = Prefetcher::new(cache, Arc::new(resolver));
        let got = prefetcher.fetch("https://youtube.com/watch?v=ABC").await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn unkeyable_url_skips_the_cache() {
        let (_dir, cache) = cache().await;
        let mut resolver = MockTrackResolver::new();
        // sin clave derivable cada fetch vuelve al resolver
        resolver
            .expect_resolve()
            .times(2)
            .returning(|_| Ok(track()));

        let prefetcher = Prefetcher::new(cache, Arc::new(resolver));
        let url = "https://youtube.com/shorts-sin-patron";

        assert_eq!(prefetcher.fetch(url).await, Some(track()));
        assert_eq!(prefetcher.fetch(url).await, Some(track()));
        assert_eq!(prefetcher.peek(url).await, None);
    }

    #[tokio::test]
    async fn spawned_handle_delivers_the_result() {
        let (_dir, cache) = cache().await;
        cache.put("ABC", &track()).await;

        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().times(0);

        let prefetcher = Prefetcher::new(cache, Arc::new(resolver));
        let handle = prefetcher.spawn("https://youtube.com/watch?v=ABC");
        assert_eq!(handle.wait().await, Some(track()));
    }
}
