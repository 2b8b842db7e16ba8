//! Utilidades de prueba: un servicio de recuperación falso servido en proceso.

use std::time::Duration;

use axum::Router;
use url::Url;

use crate::client::BackendClient;

/// Sirve `router` en un puerto libre de `127.0.0.1` y devuelve su URL base.
pub async fn spawn_backend(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

pub fn client_for(base_url: Url) -> BackendClient {
    client_with_timeout(base_url, Duration::from_secs(5))
}

pub fn client_with_timeout(base_url: Url, timeout: Duration) -> BackendClient {
    BackendClient::new(base_url, timeout, "application/pdf").unwrap()
}
