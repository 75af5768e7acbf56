//! Motor de cola por sala: estados `IDLE`/`PLAYING`, avance pista a
//! pista y prefetch adelantado de la siguiente entrada.
//!
//! Disciplina de concurrencia: todo el estado mutable de la sesión vive
//! bajo un único mutex que nunca se retiene a través de un `await`. El
//! bucle de avance corre como máximo una vez por sesión (solo se lanza
//! en la transición ociosa -> reproduciendo) y un contador de
//! generación invalida las señales de terminación que llegan después de
//! un Stop.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::audio::queue::{snapshot, QueueEntry, QueueItemInfo, RequesterId, SessionId};
use crate::audio::sink::PlaybackSink;
use crate::error::QueueError;
use crate::notify::{Notifier, QueueEvent};
use crate::prefetch::Prefetcher;
use crate::sources::ResolvedTrack;

/// Parámetros del motor, iguales para todas las sesiones del registro.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Subcadenas de dominio admitidas en las URLs de entrada.
    pub allowed_domains: Vec<String>,
    /// Espera máxima sobre un prefetch antes de resolver en línea.
    pub prefetch_wait: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            allowed_domains: vec![
                "youtube.com".to_string(),
                "youtu.be".to_string(),
                "music.youtube.com".to_string(),
            ],
            prefetch_wait: Duration::from_secs(10),
        }
    }
}

/// Resultado de admitir una URL en la cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitOutcome {
    /// La sesión estaba ociosa; la pista arranca de inmediato.
    Started,
    /// Quedó en espera en la posición indicada (base 1).
    Queued { position: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    NothingPlaying,
    Skipped,
    /// No quedaban más pistas: la sesión vuelve a ociosa.
    StoppedQueueEmpty,
}

struct SessionState {
    queue: VecDeque<QueueEntry>,
    is_playing: bool,
    /// La pista ya entregada al sink, para nombrarla en los eventos.
    now_playing: Option<ResolvedTrack>,
    // generación de la sesión; Stop la incrementa para que las señales
    // tardías de pistas previas no resuciten un avance viejo
    epoch: u64,
}

/// Una sala: cola FIFO propia, bandera de reproducción y capacidades
/// (sink y notificador) inyectadas en su construcción. Clonar es
/// barato; todas las copias comparten la misma sesión.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: SessionId,
    state: Mutex<SessionState>,
    sink: Arc<dyn PlaybackSink>,
    notifier: Arc<dyn Notifier>,
    prefetcher: Prefetcher,
    settings: EngineSettings,
}

impl Session {
    pub fn new(
        id: SessionId,
        sink: Arc<dyn PlaybackSink>,
        notifier: Arc<dyn Notifier>,
        prefetcher: Prefetcher,
        settings: EngineSettings,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                state: Mutex::new(SessionState {
                    queue: VecDeque::new(),
                    is_playing: false,
                    now_playing: None,
                    epoch: 0,
                }),
                sink,
                notifier,
                prefetcher,
                settings,
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn is_playing(&self) -> bool {
        self.inner.state.lock().is_playing
    }

    /// Entradas pendientes, en orden de reproducción.
    pub fn queue_snapshot(&self) -> Vec<QueueItemInfo> {
        snapshot(&self.inner.state.lock().queue)
    }

    /// Valida y encola una URL; si la sesión está ociosa arranca la
    /// reproducción. El prefetch de la entrada parte de inmediato.
    ///
    /// Al encolar sobre una sesión activa, el aviso de "en cola" espera
    /// de forma acotada a que el prefetch materialice los metadatos; si
    /// la espera vence, el aviso sale con la URL pelada y la resolución
    /// sigue sola hasta aterrizar en la caché.
    pub async fn admit(
        &self,
        url: &str,
        requested_by: RequesterId,
    ) -> Result<AdmitOutcome, QueueError> {
        let inner = &self.inner;
        if !url_allowed(url, &inner.settings.allowed_domains) {
            return Err(QueueError::DisallowedUrl(url.to_string()));
        }

        let handle = inner.prefetcher.spawn(url);

        {
            let mut st = inner.state.lock();
            if !st.is_playing {
                let mut entry = QueueEntry::new(url.to_string(), requested_by);
                entry.prefetch = Some(handle);
                st.queue.push_back(entry);
                st.is_playing = true;
                let epoch = st.epoch;
                drop(st);
                info!("▶️ Sesión {}: arrancando reproducción", inner.id.0);
                let session = Arc::clone(inner);
                tokio::spawn(async move { session.advance_loop(epoch).await });
                return Ok(AdmitOutcome::Started);
            }
        }

        // agotar la espera descarta el handle, no la tarea: esta corre
        // hasta el final y deja su resultado en la caché
        let resolved = timeout(inner.settings.prefetch_wait, handle.wait())
            .await
            .unwrap_or(None);

        let (position, start_epoch) = {
            let mut st = inner.state.lock();
            let mut entry = QueueEntry::new(url.to_string(), requested_by);
            entry.resolved = resolved.clone();
            st.queue.push_back(entry);
            if st.is_playing {
                (st.queue.len(), None)
            } else {
                // la sesión quedó ociosa durante la espera acotada
                st.is_playing = true;
                (0, Some(st.epoch))
            }
        };

        match start_epoch {
            Some(epoch) => {
                info!("▶️ Sesión {}: arrancando reproducción", inner.id.0);
                let session = Arc::clone(inner);
                tokio::spawn(async move { session.advance_loop(epoch).await });
                Ok(AdmitOutcome::Started)
            }
            None => {
                inner
                    .emit(QueueEvent::Queued {
                        url: url.to_string(),
                        position,
                        title: resolved.as_ref().and_then(|t| t.title.clone()),
                        uploader: resolved.and_then(|t| t.uploader),
                        requested_by,
                    })
                    .await;
                Ok(AdmitOutcome::Queued { position })
            }
        }
    }

    /// Salta la pista activa. Con más pistas en espera la señal de
    /// terminación del sink impulsa el avance; con la cola vacía la
    /// sesión se detiene.
    pub async fn skip(&self) -> SkipOutcome {
        let inner = &self.inner;
        if !inner.state.lock().is_playing {
            return SkipOutcome::NothingPlaying;
        }
        // la cabeza puede seguir resolviéndose: sin pista entregada al
        // sink todavía no hay nada que saltar
        if !inner.sink.is_playing().await {
            return SkipOutcome::NothingPlaying;
        }

        let (stop_session, skipped) = {
            let mut st = inner.state.lock();
            if !st.is_playing {
                return SkipOutcome::NothingPlaying;
            }
            let skipped = st.now_playing.clone();
            if st.queue.is_empty() {
                st.is_playing = false;
                st.now_playing = None;
                st.epoch += 1;
                (true, skipped)
            } else {
                (false, skipped)
            }
        };

        inner.sink.stop().await;

        if stop_session {
            info!("⏹️ Sesión {}: sin más pistas, detenida", inner.id.0);
            inner.emit(QueueEvent::Stopped).await;
            SkipOutcome::StoppedQueueEmpty
        } else {
            inner.emit(QueueEvent::Skipped { track: skipped }).await;
            SkipOutcome::Skipped
        }
    }

    /// Vacía la cola, invalida toda señal pendiente y desconecta el
    /// transporte. Los prefetch en vuelo de las entradas descartadas
    /// corren hasta terminar y su resultado no se usa.
    pub async fn stop(&self) {
        let inner = &self.inner;
        {
            let mut st = inner.state.lock();
            st.queue.clear();
            st.is_playing = false;
            st.now_playing = None;
            st.epoch += 1;
        }
        inner.sink.stop().await;
        inner.sink.disconnect().await;
        inner.emit(QueueEvent::Stopped).await;
        info!("⏹️ Sesión {}: detenida y cola vaciada", inner.id.0);
    }

    /// Ajusta el volumen del sink, acotado a [0.0, 2.0]. No toca la
    /// máquina de estados; requiere transporte conectado.
    pub async fn set_volume(&self, volume: f32) -> Result<f32, QueueError> {
        let inner = &self.inner;
        if !inner.sink.is_connected().await {
            return Err(QueueError::SinkUnavailable);
        }
        let volume = volume.clamp(0.0, 2.0);
        inner
            .sink
            .set_volume(volume)
            .await
            .map_err(|_| QueueError::SinkUnavailable)?;
        info!(
            "🔊 Sesión {}: volumen al {}%",
            inner.id.0,
            (volume * 100.0) as u32
        );
        Ok(volume)
    }
}

impl SessionInner {
    /// Bucle de avance: saca la cabeza, materializa sus metadatos y la
    /// entrega al sink, una pista a la vez.
    async fn advance_loop(self: Arc<Self>, epoch: u64) {
        loop {
            let entry = {
                let mut st = self.state.lock();
                if st.epoch != epoch {
                    return;
                }
                st.now_playing = None;
                match st.queue.pop_front() {
                    Some(entry) => entry,
                    None => {
                        st.is_playing = false;
                        debug!("📭 Sesión {}: cola vacía", self.id.0);
                        return;
                    }
                }
            };

            // precondición, no error: la conexión pudo caerse en paralelo
            if !self.sink.is_connected().await {
                warn!("🔌 Sesión {}: sink desconectado, deteniendo", self.id.0);
                let mut st = self.state.lock();
                if st.epoch == epoch {
                    st.is_playing = false;
                }
                return;
            }

            let QueueEntry {
                url,
                requested_by,
                prefetch,
                resolved,
                ..
            } = entry;

            // espera acotada sobre el prefetch; agotarla no es un error
            let mut track = resolved;
            if track.is_none() {
                if let Some(handle) = prefetch {
                    match timeout(self.settings.prefetch_wait, handle.wait()).await {
                        Ok(result) => track = result,
                        Err(_) => warn!("⏱️ Prefetch de {} superó la espera acotada", url),
                    }
                }
            }

            // respaldo: consulta de caché o resolución en línea
            let track = match track {
                Some(track) => Some(track),
                None => self.prefetcher.fetch(&url).await,
            };

            // un Stop pudo llegar mientras se resolvía la cabeza; su
            // resultado ya es viejo y no debe tocar el sink
            if self.state.lock().epoch != epoch {
                debug!("Sesión {}: resolución descartada tras Stop", self.id.0);
                return;
            }

            let track = match track {
                Some(track) => track,
                None => {
                    error!("❌ Sin stream reproducible para {}, saltando", url);
                    self.emit(QueueEvent::PlaybackFailed { url, requested_by })
                        .await;
                    continue;
                }
            };

            let done = match self.sink.play(&track.stream_url).await {
                Ok(done) => done,
                Err(e) => {
                    error!("❌ Sesión {}: el sink rechazó la pista: {}", self.id.0, e);
                    self.emit(QueueEvent::PlaybackFailed { url, requested_by })
                        .await;
                    let mut st = self.state.lock();
                    if st.epoch == epoch {
                        st.is_playing = false;
                    }
                    return;
                }
            };

            info!(
                "🎵 Sesión {}: reproduciendo {}",
                self.id.0,
                track.title.as_deref().unwrap_or(&url)
            );
            {
                let mut st = self.state.lock();
                if st.epoch == epoch {
                    st.now_playing = Some(track.clone());
                }
            }
            self.emit(QueueEvent::NowPlaying {
                track: track.clone(),
                requested_by,
            })
            .await;

            // prefetch oportunista de la nueva cabeza de la cola
            {
                let mut st = self.state.lock();
                if st.epoch == epoch {
                    if let Some(next) = st.queue.front_mut() {
                        if next.prefetch.is_none() && next.resolved.is_none() {
                            next.prefetch = Some(self.prefetcher.spawn(&next.url));
                        }
                    }
                }
            }

            // la señal llega exactamente una vez por `play`; un emisor
            // descartado cuenta como pista terminada
            match done.await {
                Ok(Ok(())) => debug!("Pista terminada en sesión {}", self.id.0),
                Ok(Err(e)) => error!("Error de reproducción: {}", e),
                Err(_) => debug!("El sink descartó el canal de terminación"),
            }

            if self.state.lock().epoch != epoch {
                // Stop llegó durante la pista; la señal tardía no revive nada
                return;
            }
        }
    }

    async fn emit(&self, event: QueueEvent) {
        // las fallas del notificador nunca tocan el estado de la cola
        if let Err(e) = self.notifier.notify(event).await {
            warn!("Notificación fallida en sesión {}: {}", self.id.0, e);
        }
    }
}

fn url_allowed(url: &str, domains: &[String]) -> bool {
    domains.iter().any(|domain| url.contains(domain.as_str()))
}

/// Registro de sesiones aisladas, una por sala, construidas perezosamente
/// con las capacidades que el host inyecta en la primera petición. La
/// caché de prefetch es global: se comparte entre todas las sesiones.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
    prefetcher: Prefetcher,
    settings: EngineSettings,
}

impl SessionRegistry {
    pub fn new(prefetcher: Prefetcher, settings: EngineSettings) -> Self {
        Self {
            sessions: DashMap::new(),
            prefetcher,
            settings,
        }
    }

    pub fn get_or_create(
        &self,
        id: SessionId,
        sink: Arc<dyn PlaybackSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Session {
        self.sessions
            .entry(id)
            .or_insert_with(|| {
                Session::new(
                    id,
                    sink,
                    notifier,
                    self.prefetcher.clone(),
                    self.settings.clone(),
                )
            })
            .clone()
    }

    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.sessions.get(&id).map(|session| session.clone())
    }

    /// Retira la sesión del registro; las sesiones detenidas también
    /// pueden quedarse ociosas sin costo.
    pub fn remove(&self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }
}
