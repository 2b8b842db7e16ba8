//! Sesiones del navegador: una vista por cookie, en memoria y sin persistencia.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::http::{header::COOKIE, HeaderMap};
use tracing::debug;
use uuid::Uuid;

use crate::controller::SessionState;

pub const SESSION_COOKIE: &str = "sara_session";

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_MAX_SESSIONS: usize = 10_000;

struct SessionEntry {
    state: Arc<Mutex<SessionState>>,
    last_seen: Instant,
}

/// Sesiones activas. Las inactivas más de `idle_ttl` se descartan y, al
/// llegar a `max_sessions`, se expulsa la usada hace más tiempo.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::default(),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Devuelve la sesión de la cookie, o crea una nueva si no existe.
    /// El booleano indica si la sesión es nueva (hay que fijar la cookie).
    pub fn resolve(&self, headers: &HeaderMap) -> (Uuid, Arc<Mutex<SessionState>>, bool) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().unwrap();

        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < self.idle_ttl);
        if sessions.len() < before {
            debug!("Expiradas {} sesión(es) inactivas", before - sessions.len());
        }

        if let Some(id) = session_id(headers) {
            if let Some(entry) = sessions.get_mut(&id) {
                entry.last_seen = now;
                return (id, entry.state.clone(), false);
            }
        }

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }

        let id = Uuid::new_v4();
        let state = Arc::new(Mutex::new(SessionState::default()));
        sessions.insert(id, SessionEntry { state: state.clone(), last_seen: now });
        (id, state, true)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

pub fn set_cookie_value(id: Uuid) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_session_cookie_among_others() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}")).unwrap());
        assert_eq!(session_id(&headers), Some(id));
    }

    #[test]
    fn unknown_or_invalid_cookie_creates_new_session() {
        let store = SessionStore::default();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sara_session=no-es-un-uuid"));

        let (id, _, created) = store.resolve(&headers);
        assert!(created);

        headers.insert(COOKIE, HeaderValue::from_str(&format!("{SESSION_COOKIE}={id}")).unwrap());
        let (same, _, created) = store.resolve(&headers);
        assert_eq!(same, id);
        assert!(!created);
        assert_eq!(store.len(), 1);
    }

    fn with_cookie(id: Uuid) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("{SESSION_COOKIE}={id}")).unwrap());
        headers
    }

    #[test]
    fn cookieless_requests_stay_within_capacity() {
        let store = SessionStore::new(Duration::from_secs(60), 100);
        for _ in 0..10_000 {
            store.resolve(&HeaderMap::new());
        }
        assert_eq!(store.len(), 100);
    }

    #[test]
    fn least_recently_used_session_is_evicted_first() {
        let store = SessionStore::new(Duration::from_secs(60), 2);
        let (first, _, _) = store.resolve(&HeaderMap::new());
        std::thread::sleep(Duration::from_millis(2));
        let (second, _, _) = store.resolve(&HeaderMap::new());
        std::thread::sleep(Duration::from_millis(2));
        // Tocar la primera la deja como la más reciente.
        store.resolve(&with_cookie(first));
        std::thread::sleep(Duration::from_millis(2));
        store.resolve(&HeaderMap::new());

        assert!(!store.resolve(&with_cookie(first)).2);
        let (_, _, created) = store.resolve(&with_cookie(second));
        assert!(created);
    }

    #[test]
    fn idle_session_expires() {
        let store = SessionStore::new(Duration::from_millis(20), 100);
        let (id, session, _) = store.resolve(&HeaderMap::new());
        session.lock().unwrap().view.log.append_text(crate::models::Role::User, "hola");

        std::thread::sleep(Duration::from_millis(40));
        let (new_id, fresh, created) = store.resolve(&with_cookie(id));
        assert!(created);
        assert_ne!(new_id, id);
        assert_eq!(fresh.lock().unwrap().view.log.len(), 0);
        assert_eq!(store.len(), 1);
    }
}
