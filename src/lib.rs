//! # trackflow
//!
//! Motor de cola de reproducción por sala: admite URLs, las resuelve a
//! streams reproducibles con yt-dlp, las serializa en una cola FIFO y
//! las reproduce una tras otra por un único sink activo, prefetcheando
//! la siguiente entrada contra una caché en disco con TTL.
//!
//! La plataforma anfitriona es un colaborador externo: el transporte de
//! audio ([`audio::PlaybackSink`]) y las notificaciones
//! ([`notify::Notifier`]) son capacidades inyectadas, no cosas que este
//! crate implemente.

pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod notify;
pub mod prefetch;
pub mod sources;

pub use audio::{
    AdmitOutcome, EngineSettings, PlaybackDone, PlaybackError, PlaybackResult, PlaybackSink,
    QueueItemInfo, RequesterId, Session, SessionId, SessionRegistry, SkipOutcome,
};
pub use cache::{derive_cache_key, PrefetchCache};
pub use config::Config;
pub use error::{QueueError, ResolveError};
pub use notify::{Notifier, QueueEvent};
pub use prefetch::{PrefetchHandle, Prefetcher};
pub use sources::{ResolvedTrack, ResolverConfig, TrackResolver, YtDlpResolver};
