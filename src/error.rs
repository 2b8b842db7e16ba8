//! Errores tipados del cliente HTTP y del controlador.

use serde_json::Value;
use thiserror::Error;

/// Errores detectados antes de tocar la red.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Por favor, introduce una pregunta.")]
    EmptyQuery,

    #[error("Por favor, elige ficheros para subir.")]
    EmptySelection,
}

/// Fallos de una llamada al servicio de recuperación.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Respuesta con estado no exitoso. `message` ya contiene el texto a mostrar.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Fallo de red, timeout o similar.
    #[error("Error de red: {0}")]
    Transport(String),

    /// El cuerpo de una respuesta exitosa no respeta el esquema esperado.
    #[error("Respuesta inválida del servidor: {0}")]
    MalformedResponse(String),
}

impl ClientError {
    /// Construye el error a partir del estado y el cuerpo (si lo hay) de la respuesta.
    ///
    /// Se usa el primer campo legible de `detail`, `message` o `error`;
    /// si no existe, un mensaje genérico con el código de estado.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| server_message(&v))
            .unwrap_or_else(|| generic_http_message(status));
        Self::Http { status, message }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub fn generic_http_message(status: u16) -> String {
    format!("Error HTTP, estado {status}")
}

fn server_message(body: &Value) -> Option<String> {
    ["detail", "message", "error"].iter().find_map(|key| match body.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        // FastAPI devuelve `detail` como lista de errores de validación.
        Some(v @ (Value::Array(_) | Value::Object(_))) => Some(v.to_string()),
        _ => None,
    })
}

/// Fallo de la subida por URL firmada, separado por etapa.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignedUploadError {
    /// La emisión de la URL falló; no se intentó el PUT.
    #[error("{0}")]
    Issue(ClientError),

    /// La URL se obtuvo pero el PUT al almacenamiento falló.
    #[error("Error al subir el fichero al almacenamiento.")]
    Put(ClientError),
}

/// Error de cualquiera de las dos variantes de subida.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error(transparent)]
    Proxy(#[from] ClientError),

    #[error("{file}: {source}")]
    Signed {
        file: String,
        #[source]
        source: SignedUploadError,
    },
}
