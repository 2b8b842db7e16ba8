use axum::{
    extract::{DefaultBodyLimit, Form, Multipart, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    controller::Outcome,
    models::{UploadFile, UploadSelection},
    session::set_cookie_value,
    view::{render_page, ViewState},
};

// --- Payloads ---

#[derive(Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    query: String,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    let body_limit = app_state.config.max_upload_bytes;
    Router::new()
        .route("/", get(page_handler))
        .route("/ui/search", post(search_handler))
        .route("/ui/upload", post(upload_handler))
        .route("/ui/state", get(state_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn page_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, session, created) = state.sessions.resolve(&headers);
    let page = render_page(&session.lock().unwrap().view);
    with_session_cookie(Html(page).into_response(), created.then_some(id))
}

/// Espera a la respuesta del backend y redirige ya con el render final;
/// `PENDING_TEXT` sólo lo ve un render concurrente de la misma sesión.
#[axum::debug_handler]
async fn search_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<SearchForm>,
) -> Response {
    let (id, session, created) = state.sessions.resolve(&headers);

    match state.controller.search(&session, &form.query).await {
        Outcome::Rejected(e) => debug!("Búsqueda rechazada: {e}"),
        Outcome::Discarded => debug!("Respuesta de búsqueda descartada por obsoleta"),
        Outcome::Rendered => {}
    }

    with_session_cookie(Redirect::to("/").into_response(), created.then_some(id))
}

#[axum::debug_handler]
async fn upload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (id, session, created) = state.sessions.resolve(&headers);
    let selection = read_selection(multipart).await?;
    info!("Recibidos {} fichero(s) para subir", selection.files().len());

    if let Outcome::Rejected(e) = state.controller.upload(&session, selection).await {
        debug!("Subida rechazada: {e}");
    }

    Ok(with_session_cookie(Redirect::to("/").into_response(), created.then_some(id)))
}

#[axum::debug_handler]
async fn state_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, session, created) = state.sessions.resolve(&headers);
    let view: ViewState = session.lock().unwrap().view.clone();
    with_session_cookie(Json(view).into_response(), created.then_some(id))
}

#[axum::debug_handler]
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": "SARA frontend service is running" }))
}

// --- Utilidades ---

/// Lee los campos `files` del formulario. Las partes sin nombre de fichero
/// y sin contenido (input vacío del navegador) se ignoran.
async fn read_selection(mut multipart: Multipart) -> Result<UploadSelection, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(bad_multipart)?;
        if name.is_empty() && bytes.is_empty() {
            continue;
        }
        files.push(UploadFile { name, bytes: bytes.to_vec() });
    }
    Ok(UploadSelection::new(files))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    error!("Formulario multipart inválido: {e}");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": format!("Formulario multipart inválido: {e}")})),
    )
}

fn with_session_cookie(mut response: Response, new_session: Option<Uuid>) -> Response {
    if let Some(id) = new_session {
        if let Ok(value) = HeaderValue::from_str(&set_cookie_value(id)) {
            response.headers_mut().insert(SET_COOKIE, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::routing::{get as get_route, post as post_route};
    use reqwest::{header, redirect::Policy, StatusCode as ReqStatus};
    use serde_json::Value;
    use url::Url;

    use super::*;
    use crate::{
        config::{AppConfig, UploadMode},
        controller::Controller,
        testing::{client_for, spawn_backend},
    };

    fn test_config(backend_url: Url) -> AppConfig {
        AppConfig {
            server_addr: "127.0.0.1:0".to_string(),
            backend_url,
            search_top_k: 3,
            upload_mode: UploadMode::Proxy,
            signed_upload_content_type: "application/pdf".to_string(),
            request_timeout: Duration::from_secs(5),
            static_dir: "static".to_string(),
            max_upload_bytes: 1024 * 1024,
            session_idle_ttl: Duration::from_secs(60),
            max_sessions: 100,
            open_browser: false,
        }
    }

    async fn spawn_app(backend: Router) -> Url {
        let backend_url = spawn_backend(backend).await;
        let cfg = test_config(backend_url.clone());
        let controller = Controller::new(client_for(backend_url), cfg.search_top_k, cfg.upload_mode.clone());
        spawn_backend(create_router(AppState::new(cfg, controller))).await
    }

    fn browser() -> reqwest::Client {
        reqwest::Client::builder().redirect(Policy::none()).build().unwrap()
    }

    fn session_cookie(response: &reqwest::Response) -> String {
        let raw = response.headers()[header::SET_COOKIE].to_str().unwrap();
        raw.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn search_form_renders_results_into_session_page() {
        let backend = Router::new().route(
            "/api/search",
            get_route(|| async {
                Json(json!({
                    "kind": "results",
                    "results": [{"content": "X is...", "similarity": 0.87, "paper_id": "p1"}]
                }))
            }),
        );
        let app = spawn_app(backend).await;
        let http = browser();

        let response = http
            .post(app.join("ui/search").unwrap())
            .form(&[("query", "What is X?")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), ReqStatus::SEE_OTHER);
        let cookie = session_cookie(&response);

        let page = http
            .get(app.clone())
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap();
        assert!(page.headers().get(header::SET_COOKIE).is_none());
        let html = page.text().await.unwrap();
        assert!(html.contains("What is X?"));
        assert!(html.contains("87.0%"));
        assert!(html.contains("Fuente: p1"));
        assert!(!html.contains("thinking-message"));
    }

    #[tokio::test]
    async fn sessions_do_not_share_logs() {
        let backend = Router::new().route(
            "/api/search",
            get_route(|| async { Json(json!({"kind": "answer", "answer": "42"})) }),
        );
        let app = spawn_app(backend).await;
        let http = browser();

        let first = http
            .post(app.join("ui/search").unwrap())
            .form(&[("query", "pregunta")])
            .send()
            .await
            .unwrap();
        let first_cookie = session_cookie(&first);

        let other: Value = http.get(app.join("ui/state").unwrap()).send().await.unwrap().json().await.unwrap();
        assert_eq!(other["log"]["entries"].as_array().unwrap().len(), 0);

        let mine: Value = http
            .get(app.join("ui/state").unwrap())
            .header(header::COOKIE, &first_cookie)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let entries = mine["log"]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["role"], "user");
        assert_eq!(entries[1]["body"]["text"], "42");
        assert_eq!(mine["pending"], false);
    }

    #[tokio::test]
    async fn empty_query_shows_validation_message() {
        let app = spawn_app(Router::new()).await;
        let http = browser();

        let response = http
            .post(app.join("ui/search").unwrap())
            .form(&[("query", "")])
            .send()
            .await
            .unwrap();
        let cookie = session_cookie(&response);

        let view: Value = http
            .get(app.join("ui/state").unwrap())
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["validation"], "Por favor, introduce una pregunta.");
        assert_eq!(view["log"]["entries"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn upload_form_forwards_files_and_reports_message() {
        let backend = Router::new().route(
            "/api/upload",
            post_route(|mut multipart: Multipart| async move {
                let mut count = 0;
                while let Some(field) = multipart.next_field().await.unwrap() {
                    assert_eq!(field.name(), Some("files"));
                    count += 1;
                }
                Json(json!({"message": format!("{count} ficheros recibidos")}))
            }),
        );
        let app = spawn_app(backend).await;
        let http = browser();

        let form = reqwest::multipart::Form::new()
            .part("files", reqwest::multipart::Part::bytes(b"uno".to_vec()).file_name("a.pdf"))
            .part("files", reqwest::multipart::Part::bytes(b"dos".to_vec()).file_name("b.pdf"));
        let response = http.post(app.join("ui/upload").unwrap()).multipart(form).send().await.unwrap();
        assert_eq!(response.status(), ReqStatus::SEE_OTHER);
        let cookie = session_cookie(&response);

        let view: Value = http
            .get(app.join("ui/state").unwrap())
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["upload"]["state"], "success");
        assert_eq!(view["upload"]["message"], "2 ficheros recibidos");
        assert!(view["file_preview"].is_null());
    }

    #[tokio::test]
    async fn upload_form_without_files_is_rejected_before_backend() {
        let app = spawn_app(Router::new()).await;
        let http = browser();

        // El navegador envía una parte vacía cuando no se elige fichero.
        let form = reqwest::multipart::Form::new()
            .part("files", reqwest::multipart::Part::bytes(Vec::new()).file_name(""));
        let response = http.post(app.join("ui/upload").unwrap()).multipart(form).send().await.unwrap();
        let cookie = session_cookie(&response);

        let view: Value = http
            .get(app.join("ui/state").unwrap())
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["validation"], "Por favor, elige ficheros para subir.");
        assert_eq!(view["upload"]["state"], "idle");
    }

    #[tokio::test]
    async fn health_reports_running() {
        let app = spawn_app(Router::new()).await;
        let body: Value = browser().get(app.join("health").unwrap()).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["message"], "SARA frontend service is running");
    }
}
