//! Modelos de dominio: consultas, resultados de búsqueda, selección de ficheros
//! y el registro de conversación.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Texto de búsqueda no vacío introducido por el usuario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    /// Valida la entrada. Los espacios en los extremos se descartan.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Un registro devuelto por el servicio de búsqueda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    /// Entre 0.0 y 1.0.
    pub similarity: f64,
    #[serde(alias = "paper_id", alias = "source_filename")]
    pub source: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
}

impl SearchHit {
    /// Similitud como porcentaje con un decimal, p. ej. `87.0%`.
    pub fn similarity_label(&self) -> String {
        format!("{:.1}%", self.similarity.clamp(0.0, 1.0) * 100.0)
    }
}

/// Esquema canónico de respuesta de `/api/search`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchResponse {
    /// Respuesta generada a partir de los documentos.
    Answer { answer: String },
    /// Fragmentos recuperados, ya ordenados por el backend.
    Results { results: Vec<SearchHit> },
}

/// Un fichero elegido para subir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Conjunto de ficheros de una subida.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSelection {
    files: Vec<UploadFile>,
}

impl UploadSelection {
    pub fn new(files: Vec<UploadFile>) -> Self {
        Self { files }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    pub fn names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
    Error,
}

impl Role {
    pub fn css_class(self) -> &'static str {
        match self {
            Role::User => "user-message",
            Role::Bot => "bot-message",
            Role::Error => "error-message",
        }
    }
}

/// Cuerpo de una entrada del registro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryBody {
    Text { text: String },
    Hit { hit: SearchHit },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub role: Role,
    pub body: EntryBody,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
impl LogEntry {
    /// Texto plano de la entrada.
    pub fn text(&self) -> String {
        match &self.body {
            EntryBody::Text { text } => text.clone(),
            EntryBody::Hit { hit } => hit.content.clone(),
        }
    }
}

/// Registro de conversación de una sesión. Sólo admite añadir entradas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationLog {
    entries: Vec<LogEntry>,
}

impl ConversationLog {
    pub fn append_text(&mut self, role: Role, text: impl Into<String>) {
        self.entries.push(LogEntry {
            role,
            body: EntryBody::Text { text: text.into() },
            created_at: Utc::now(),
        });
    }

    pub fn append_hit(&mut self, hit: SearchHit) {
        self.entries.push(LogEntry {
            role: Role::Bot,
            body: EntryBody::Hit { hit },
            created_at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
