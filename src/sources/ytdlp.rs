use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use super::{ResolvedTrack, TrackResolver};
use crate::error::ResolveError;

/// Opciones de extracción como campos explícitos, configuradas una vez
/// al arrancar e inyectadas en el resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Preferencia de formato de audio pasada a yt-dlp.
    pub format: String,
    /// Archivo de cookies opcional para fuentes que lo requieran.
    pub cookies_file: Option<PathBuf>,
    /// Fuerza el enlace de red a IPv4 (IPv6 da problemas con algunos CDN).
    pub force_ipv4: bool,
    pub geo_bypass: bool,
    /// Validación de certificados TLS. Relajarla es opt-in, nunca el default.
    pub check_certificates: bool,
    /// Pausa entre peticiones al extractor, en segundos.
    pub sleep_requests_secs: f64,
    /// Límite de tasa de descarga en bytes por segundo.
    pub rate_limit_bytes: u64,
    pub retries: u32,
    pub socket_timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            format: "bestaudio[ext=m4a]/bestaudio/best".to_string(),
            cookies_file: None,
            force_ipv4: true,
            geo_bypass: true,
            check_certificates: true,
            sleep_requests_secs: 1.0,
            rate_limit_bytes: 50_000,
            retries: 3,
            socket_timeout_secs: 30,
        }
    }
}

/// Resolver que delega la extracción en el binario yt-dlp.
pub struct YtDlpResolver {
    config: ResolverConfig,
}

impl YtDlpResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, url: &str) -> Command {
        let mut cmd = Command::new("yt-dlp");
        cmd.args(["--dump-single-json", "--no-playlist", "--no-warnings"]);
        cmd.args(["--format", &self.config.format]);
        cmd.args(["--socket-timeout", &self.config.socket_timeout_secs.to_string()]);
        cmd.args(["--retries", &self.config.retries.to_string()]);
        cmd.args(["--sleep-requests", &self.config.sleep_requests_secs.to_string()]);
        cmd.args(["--limit-rate", &self.config.rate_limit_bytes.to_string()]);

        if self.config.force_ipv4 {
            cmd.arg("--force-ipv4");
        }
        if self.config.geo_bypass {
            cmd.arg("--geo-bypass");
        }
        if !self.config.check_certificates {
            cmd.arg("--no-check-certificates");
        }
        if let Some(cookies) = &self.config.cookies_file {
            cmd.arg("--cookies");
            cmd.arg(cookies);
        }

        cmd.arg(url);
        cmd
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, url: &str) -> Result<ResolvedTrack, ResolveError> {
        debug!("🔍 Extrayendo metadatos de {}", url);

        let output = self.build_command(url).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Extraction(stderr.trim().to_string()));
        }

        parse_extraction(&output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct Extraction {
    title: Option<String>,
    uploader: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    #[serde(default)]
    entries: Vec<Extraction>,
}

impl Extraction {
    /// Los resultados con forma de playlist colapsan a su primera entrada.
    fn into_first(mut self) -> Self {
        match std::mem::take(&mut self.entries).into_iter().next() {
            Some(first) => first,
            None => self,
        }
    }
}

fn parse_extraction(raw: &[u8]) -> Result<ResolvedTrack, ResolveError> {
    let extraction: Extraction = serde_json::from_slice(raw)?;
    let data = extraction.into_first();

    let stream_url = data
        .url
        .filter(|u| !u.is_empty())
        .ok_or(ResolveError::MissingStreamUrl)?;

    Ok(ResolvedTrack {
        title: data.title,
        webpage_url: data.webpage_url,
        uploader: data.uploader,
        stream_url,
    })
}
