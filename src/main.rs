// Módulos de la aplicación
mod api;
mod app_state;
mod client;
mod config;
mod controller;
mod error;
mod models;
mod session;
mod view;

#[cfg(test)]
mod testing;

use crate::app_state::AppState;
use anyhow::Result;
use axum::Router;
use tower_http::services::ServeDir;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env()?;
    info!(
        "Servicio de recuperación en {} (top_k={}, subida={:?})",
        cfg.backend_url, cfg.search_top_k, cfg.upload_mode
    );

    // 3. Cliente del backend y controlador
    let controller = controller::Controller::from_config(&cfg)?;

    // 4. Estado compartido y router
    let app_state = AppState::new(cfg.clone(), controller);
    let app = Router::new()
        .merge(api::create_router(app_state))
        .nest_service("/static", ServeDir::new(&cfg.static_dir));

    // 5. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&cfg.server_addr).await?;
    let server_url = format!("http://{}", cfg.server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    if cfg.open_browser && webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Apagado ordenado con Ctrl+C.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("No se pudo escuchar la señal de apagado: {e}");
                return;
            }
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
