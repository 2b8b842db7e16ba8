//! Carga y gestión de configuración del frontend (servidor + servicio de recuperación).

use std::env;
use std::time::Duration;
use anyhow::{anyhow, Result};
use url::Url;

/// Forma en la que se suben los documentos al backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadMode {
    /// Multipart a `/api/upload`; el backend hace de proxy hacia el almacenamiento.
    Proxy,
    /// Pide una URL firmada y sube los bytes directamente al almacenamiento.
    SignedUrl,
}

impl UploadMode {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "proxy" => Ok(Self::Proxy),
            "signed-url" | "signed_url" | "signed" => Ok(Self::SignedUrl),
            other => Err(anyhow!("Modo de subida no soportado: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,
    pub backend_url: Url,
    pub search_top_k: usize,
    pub upload_mode: UploadMode,
    pub signed_upload_content_type: String,
    pub request_timeout: Duration,
    pub static_dir: String,
    pub max_upload_bytes: usize,
    /// Tiempo sin actividad tras el cual una sesión se descarta.
    pub session_idle_ttl: Duration,
    pub max_sessions: usize,
    pub open_browser: bool,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de consulta de variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("BACKEND_URL")
            .ok_or_else(|| anyhow!("Falta BACKEND_URL en el entorno"))?;
        let backend_url = Url::parse(&backend_url)
            .map_err(|e| anyhow!("BACKEND_URL no es una URL válida: {e}"))?;

        let server_addr =
            lookup("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:3322".to_string());

        let search_top_k = match lookup("SEARCH_TOP_K") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| anyhow!("SEARCH_TOP_K debe ser un entero positivo: {v}"))?,
            None => 3,
        };
        if search_top_k == 0 {
            return Err(anyhow!("SEARCH_TOP_K debe ser mayor que 0"));
        }

        let upload_mode_str = lookup("UPLOAD_MODE").unwrap_or_else(|| "proxy".to_string());
        let upload_mode = UploadMode::from_str(&upload_mode_str)?;

        let signed_upload_content_type = lookup("SIGNED_UPLOAD_CONTENT_TYPE")
            .unwrap_or_else(|| "application/pdf".to_string());

        let timeout_secs = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| anyhow!("REQUEST_TIMEOUT_SECS debe ser un entero: {v}"))?,
            None => 60,
        };

        let static_dir = lookup("STATIC_DIR").unwrap_or_else(|| "static".to_string());

        let max_upload_bytes = match lookup("MAX_UPLOAD_MB") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| anyhow!("MAX_UPLOAD_MB debe ser un entero: {v}"))?
                .checked_mul(1024 * 1024)
                .ok_or_else(|| anyhow!("MAX_UPLOAD_MB demasiado grande: {v}"))?,
            None => 50 * 1024 * 1024,
        };

        let session_idle_secs = match lookup("SESSION_IDLE_MINUTES") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| anyhow!("SESSION_IDLE_MINUTES debe ser un entero: {v}"))?
                .checked_mul(60)
                .ok_or_else(|| anyhow!("SESSION_IDLE_MINUTES demasiado grande: {v}"))?,
            None => 30 * 60,
        };

        let max_sessions = match lookup("MAX_SESSIONS") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| anyhow!("MAX_SESSIONS debe ser un entero: {v}"))?,
            None => 10_000,
        };
        if max_sessions == 0 {
            return Err(anyhow!("MAX_SESSIONS debe ser mayor que 0"));
        }

        let open_browser = lookup("OPEN_BROWSER")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            server_addr,
            backend_url,
            search_top_k,
            upload_mode,
            signed_upload_content_type,
            request_timeout: Duration::from_secs(timeout_secs),
            static_dir,
            max_upload_bytes,
            session_idle_ttl: Duration::from_secs(session_idle_secs),
            max_sessions,
            open_browser,
        })
    }
}
