//! Cliente HTTP hacia el servicio de recuperación (búsqueda y subida de documentos).
//!
//! Endpoints consumidos:
//!   - `GET  api/search?query=..&top_k=..`
//!   - `POST api/upload` (multipart, campo `files`)
//!   - `POST documents/generate-upload-url` + `PUT <signedUrl>`

use std::time::Duration;

use anyhow::Result;
use reqwest::{header::CONTENT_TYPE, multipart, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, info};
use url::Url;

use crate::{
    config::AppConfig,
    error::{ClientError, SignedUploadError},
    models::{Query, SearchResponse, UploadFile, UploadSelection},
};

const SEARCH_PATH: &str = "api/search";
const UPLOAD_PATH: &str = "api/upload";
const UPLOAD_URL_PATH: &str = "documents/generate-upload-url";

#[derive(Serialize)]
struct UploadUrlRequest<'a> {
    filename: &'a str,
}

#[derive(Deserialize)]
struct UploadUrlReply {
    #[serde(rename = "signedUrl", alias = "signed_url")]
    signed_url: String,
}

#[derive(Deserialize)]
struct UploadReply {
    message: String,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    signed_content_type: String,
}

impl BackendClient {
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        Self::new(
            cfg.backend_url.clone(),
            cfg.request_timeout,
            &cfg.signed_upload_content_type,
        )
    }

    pub fn new(mut base_url: Url, timeout: Duration, signed_content_type: &str) -> Result<Self> {
        // Con barra final `join` conserva el prefijo de ruta de la base.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            signed_content_type: signed_content_type.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Transport(format!("URL inválida para {path}: {e}")))
    }

    /// Lanza una búsqueda y devuelve la respuesta en el esquema canónico.
    pub async fn search(&self, query: &Query, top_k: usize) -> Result<SearchResponse, ClientError> {
        let url = self.endpoint(SEARCH_PATH)?;
        info!("Buscando '{}' (top_k={top_k})", query.as_str());

        let top_k = top_k.to_string();
        let response = self
            .http
            .get(url)
            .query(&[("query", query.as_str()), ("top_k", top_k.as_str())])
            .send()
            .await?;

        read_json(response).await
    }

    /// Sube todos los ficheros en una única petición multipart.
    /// Devuelve el mensaje de confirmación del servidor.
    pub async fn upload(&self, selection: &UploadSelection) -> Result<String, ClientError> {
        let url = self.endpoint(UPLOAD_PATH)?;

        let mut form = multipart::Form::new();
        for file in selection.files() {
            let mime = mime_guess::from_path(&file.name).first_or_octet_stream();
            let part = multipart::Part::bytes(file.bytes.clone())
                .file_name(file.name.clone())
                .mime_str(mime.as_ref())?;
            form = form.part("files", part);
        }

        info!("Subiendo {} fichero(s) vía proxy", selection.files().len());
        let response = self.http.post(url).multipart(form).send().await?;
        let reply: UploadReply = read_json(response).await?;
        Ok(reply.message)
    }

    /// Primera etapa de la subida directa: obtiene la URL firmada para `filename`.
    pub async fn generate_upload_url(&self, filename: &str) -> Result<String, ClientError> {
        let url = self.endpoint(UPLOAD_URL_PATH)?;
        let response = self
            .http
            .post(url)
            .json(&UploadUrlRequest { filename })
            .send()
            .await?;
        let reply: UploadUrlReply = read_json(response).await?;
        Ok(reply.signed_url)
    }

    /// Segunda etapa: PUT de los bytes crudos a la URL firmada.
    pub async fn put_signed(&self, signed_url: &str, bytes: Vec<u8>) -> Result<(), ClientError> {
        let response = self
            .http
            .put(signed_url)
            .header(CONTENT_TYPE, self.signed_content_type.as_str())
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_status(status.as_u16(), &body))
    }

    /// Subida directa al almacenamiento en dos etapas. Si la emisión de la URL
    /// falla no se intenta el PUT.
    pub async fn upload_signed(&self, file: &UploadFile) -> Result<(), SignedUploadError> {
        let signed_url = self
            .generate_upload_url(&file.name)
            .await
            .map_err(|e| {
                error!("No se pudo obtener la URL firmada para {}: {e}", file.name);
                SignedUploadError::Issue(e)
            })?;

        info!("URL firmada obtenida para {}, subiendo bytes", file.name);
        self.put_signed(&signed_url, file.bytes.clone())
            .await
            .map_err(|e| {
                error!("Falló el PUT de {} al almacenamiento: {e}", file.name);
                SignedUploadError::Put(e)
            })
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::from_status(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse(e.to_string()))
}
