//! Controlador de búsqueda y subida.
//!
//! Cada interacción se divide en etapas explícitas:
//!   1. `begin_*`: validación y estado "pendiente" (sin red).
//!   2. Llamada al servicio de recuperación fuera del bloqueo de la sesión.
//!   3. `complete_*`: se aplica el resultado tipado a la vista, salvo que una
//!      petición posterior lo haya dejado obsoleto.

use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::{
    client::BackendClient,
    config::{AppConfig, UploadMode},
    error::{ClientError, UploadError, ValidationError},
    models::{Query, Role, SearchResponse, UploadSelection},
    view::{UploadStatus, ViewState},
};

pub const NO_RESULTS_TEXT: &str = "No se encontraron resultados para esta pregunta.";

/// Petición de búsqueda en curso.
#[derive(Debug, Clone)]
pub struct SearchTicket {
    token: u64,
    pub query: Query,
}

/// Subida en curso. Posee la selección; se descarta al completarse.
#[derive(Debug)]
pub struct UploadTicket {
    token: u64,
    pub selection: UploadSelection,
}

/// Resultado de una interacción completa, útil para los handlers y los logs.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rejected(ValidationError),
    Rendered,
    /// Llegó una respuesta de una petición ya superada por otra más reciente.
    Discarded,
}

/// Estado de una sesión: la vista más los contadores de peticiones.
#[derive(Debug, Default)]
pub struct SessionState {
    pub view: ViewState,
    search_seq: u64,
    upload_seq: u64,
}

impl SessionState {
    pub fn begin_search(&mut self, raw: &str) -> Result<SearchTicket, ValidationError> {
        let query = match Query::parse(raw) {
            Ok(q) => q,
            Err(e) => {
                self.view.validation = Some(e.to_string());
                return Err(e);
            }
        };
        self.view.validation = None;
        self.view.log.append_text(Role::User, query.as_str());
        self.view.pending = true;
        self.search_seq += 1;
        Ok(SearchTicket { token: self.search_seq, query })
    }

    /// Aplica la respuesta. Devuelve `false` si el ticket está obsoleto.
    pub fn complete_search(
        &mut self,
        ticket: &SearchTicket,
        result: Result<SearchResponse, ClientError>,
    ) -> bool {
        if ticket.token != self.search_seq {
            debug!(
                "Descartada respuesta obsoleta de '{}' (token {} < {})",
                ticket.query.as_str(),
                ticket.token,
                self.search_seq
            );
            return false;
        }

        self.view.pending = false;
        match result {
            Ok(SearchResponse::Answer { answer }) => self.view.log.append_text(Role::Bot, answer),
            Ok(SearchResponse::Results { results }) if results.is_empty() => {
                self.view.log.append_text(Role::Bot, NO_RESULTS_TEXT)
            }
            Ok(SearchResponse::Results { results }) => {
                for hit in results {
                    self.view.log.append_hit(hit);
                }
            }
            Err(e) => self.view.log.append_text(Role::Error, format!("Error: {e}")),
        }
        true
    }

    /// Muestra los nombres elegidos y limpia el estado de la subida anterior.
    pub fn select_files(&mut self, names: &[String]) {
        self.view.upload = UploadStatus::Idle;
        self.view.file_preview = if names.is_empty() {
            None
        } else {
            Some(format!("Seleccionados: {}", names.join(", ")))
        };
    }

    pub fn begin_upload(&mut self, selection: UploadSelection) -> Result<UploadTicket, ValidationError> {
        if selection.is_empty() {
            let e = ValidationError::EmptySelection;
            self.view.validation = Some(e.to_string());
            return Err(e);
        }
        self.view.validation = None;
        self.view.upload = UploadStatus::Pending;
        self.upload_seq += 1;
        Ok(UploadTicket { token: self.upload_seq, selection })
    }

    /// Aplica el resultado y limpia selección y vista previa.
    pub fn complete_upload(&mut self, ticket: UploadTicket, result: Result<String, UploadError>) -> bool {
        if ticket.token != self.upload_seq {
            debug!("Descartado resultado obsoleto de subida (token {})", ticket.token);
            return false;
        }
        self.view.upload = match result {
            Ok(message) => UploadStatus::Success(message),
            Err(e) => UploadStatus::Error(e.to_string()),
        };
        self.view.file_preview = None;
        true
    }
}

/// Orquesta las etapas contra el servicio de recuperación.
#[derive(Debug, Clone)]
pub struct Controller {
    client: BackendClient,
    top_k: usize,
    upload_mode: UploadMode,
}

impl Controller {
    pub fn new(client: BackendClient, top_k: usize, upload_mode: UploadMode) -> Self {
        Self { client, top_k, upload_mode }
    }

    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            BackendClient::from_config(cfg)?,
            cfg.search_top_k,
            cfg.upload_mode.clone(),
        ))
    }

    pub async fn search(&self, session: &Mutex<SessionState>, raw: &str) -> Outcome {
        let begun = session.lock().unwrap().begin_search(raw);
        let ticket = match begun {
            Ok(t) => t,
            Err(e) => return Outcome::Rejected(e),
        };

        let result = self.client.search(&ticket.query, self.top_k).await;
        if let Err(e) = &result {
            warn!(status = ?e.status(), "Error en la búsqueda '{}': {e}", ticket.query.as_str());
        }

        let mut state = session.lock().unwrap();
        if state.complete_search(&ticket, result) {
            debug!("Registro de la sesión con {} entradas", state.view.log.len());
            Outcome::Rendered
        } else {
            Outcome::Discarded
        }
    }

    pub async fn upload(&self, session: &Mutex<SessionState>, selection: UploadSelection) -> Outcome {
        let ticket = {
            let mut state = session.lock().unwrap();
            state.select_files(&selection.names());
            match state.begin_upload(selection) {
                Ok(t) => t,
                Err(e) => return Outcome::Rejected(e),
            }
        };

        let result = match self.upload_mode {
            UploadMode::Proxy => self.client.upload(&ticket.selection).await.map_err(UploadError::from),
            UploadMode::SignedUrl => self.upload_signed(&ticket.selection).await,
        };
        match &result {
            Ok(message) => info!("Subida completada: {message}"),
            Err(e) => warn!("Error en la subida: {e}"),
        }

        if session.lock().unwrap().complete_upload(ticket, result) {
            Outcome::Rendered
        } else {
            Outcome::Discarded
        }
    }

    /// Sube los ficheros uno a uno; el primer fallo corta el lote.
    async fn upload_signed(&self, selection: &UploadSelection) -> Result<String, UploadError> {
        for file in selection.files() {
            self.client
                .upload_signed(file)
                .await
                .map_err(|source| UploadError::Signed { file: file.name.clone(), source })?;
        }
        Ok(format!(
            "Subido(s) correctamente: {}",
            selection.names().join(", ")
        ))
    }
}
