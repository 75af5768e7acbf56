use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::EngineSettings;
use crate::sources::ResolverConfig;

/// Configuración leída del entorno (con soporte .env). El core no es
/// dueño de estos valores; solo los consume.
#[derive(Debug, Clone)]
pub struct Config {
    // Caché
    pub cache_file: PathBuf,
    pub cache_ttl_secs: u64,

    // Cola
    pub allowed_domains: Vec<String>,
    pub prefetch_wait_secs: u64,

    // Extracción
    pub resolver: ResolverConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            cache_file: std::env::var("CACHE_FILE")
                .unwrap_or_else(|_| "prefetch_cache.json".to_string())
                .into(),
            cache_ttl_secs: std::env::var("CACHE_TTL")
                .unwrap_or_else(|_| "10800".to_string()) // 3 horas
                .parse()?,
            allowed_domains: std::env::var("ALLOWED_DOMAINS")
                .map(|raw| parse_domains(&raw))
                .unwrap_or_else(|_| EngineSettings::default().allowed_domains),
            prefetch_wait_secs: std::env::var("PREFETCH_WAIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            resolver: ResolverConfig {
                format: std::env::var("YTDLP_FORMAT")
                    .unwrap_or_else(|_| ResolverConfig::default().format),
                cookies_file: std::env::var("COOKIES_FILE").ok().map(Into::into),
                check_certificates: std::env::var("CHECK_CERTIFICATES")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                ..ResolverConfig::default()
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Chequeos de sanidad sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            anyhow::bail!("CACHE_TTL debe ser mayor que 0");
        }
        if self.prefetch_wait_secs == 0 {
            anyhow::bail!("PREFETCH_WAIT debe ser mayor que 0");
        }
        if self.allowed_domains.is_empty() {
            anyhow::bail!("la lista de dominios permitidos no puede quedar vacía");
        }
        if self.resolver.format.is_empty() {
            anyhow::bail!("YTDLP_FORMAT no puede quedar vacío");
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            allowed_domains: self.allowed_domains.clone(),
            prefetch_wait: Duration::from_secs(self.prefetch_wait_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_file: "prefetch_cache.json".into(),
            cache_ttl_secs: 10800, // 3 horas
            allowed_domains: EngineSettings::default().allowed_domains,
            prefetch_wait_secs: 10,
            resolver: ResolverConfig::default(),
        }
    }
}

fn parse_domains(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|domain| domain.trim().to_string())
        .filter(|domain| !domain.is_empty())
        .collect()
}
