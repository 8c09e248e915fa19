//! End-to-end integration tests against the redb-backed store

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::Duration;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use session_auth::clock::ManualClock;
use session_auth::config::{Config, ServerConfig, StoreConfig};
use session_auth::gate::{AuthGate, GateOutcome, GateRejection, RouteClassifier};
use session_auth::storage::keys::{session_key, user_key};
use session_auth::storage::{Database, SessionStore};
use session_auth::tokens::{Credentials, SessionConfig, SessionManager};
use session_auth::users::{Argon2Scheme, PasswordScheme, StaticDirectory, User};
use session_auth::{api, AppState};

fn directory() -> StaticDirectory {
    let user = |id: &str, email: &str, password: &str| User {
        email: email.to_string(),
        id: id.to_string(),
        password_hash: Argon2Scheme.hash(password).unwrap(),
    };
    StaticDirectory::new(vec![
        user("user-a", "a@x.com", "p1"),
        user("user-b", "b@x.com", "p2"),
    ])
    .unwrap()
}

fn setup(clock: &ManualClock) -> (SessionManager, Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open_with_clock(temp_dir.path(), Arc::new(clock.clone())).unwrap();
    let manager = SessionManager::new(
        SessionConfig::default(),
        Arc::new(db.clone()),
        Arc::new(directory()),
        Arc::new(Argon2Scheme),
    );
    (manager, db, temp_dir)
}

fn credentials(email: &str, password: &str) -> Credentials {
    Credentials {
        email: email.to_string(),
        password: password.to_string(),
    }
}

fn cookie_headers(token: &str) -> axum::http::HeaderMap {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(header::COOKIE, format!("session={token}").parse().unwrap());
    headers
}

#[test]
fn test_login_relogin_logout_scenario() {
    let clock = ManualClock::default();
    let (manager, db, _temp) = setup(&clock);
    let gate = AuthGate::new(RouteClassifier::default(), manager.clone());

    // Login writes both index entries
    let first = manager.create_session(&credentials("a@x.com", "p1")).unwrap();
    assert_eq!(
        db.get(&session_key(&first.token)).unwrap().as_deref(),
        Some(b"user-a".as_slice())
    );
    assert_eq!(
        db.get(&user_key("user-a")).unwrap(),
        Some(first.token.clone().into_bytes())
    );

    let outcome = gate
        .authenticate("/v1/orders", &Method::GET, &cookie_headers(&first.token))
        .unwrap();
    assert!(matches!(outcome, GateOutcome::Authenticated(p) if p.user_id == "user-a"));

    // A second login revokes the first token
    let second = manager.create_session(&credentials("a@x.com", "p1")).unwrap();
    assert_ne!(first.token, second.token);
    assert!(!db.exists(&session_key(&first.token)).unwrap());
    assert_eq!(
        gate.authenticate("/v1/orders", &Method::GET, &cookie_headers(&first.token)),
        Err(GateRejection::InvalidSession)
    );

    // Logout blanks the pointer and kills the token
    manager.delete_session("user-a", &second.token).unwrap();
    assert_eq!(db.get(&user_key("user-a")).unwrap(), Some(Vec::new()));
    assert!(manager.current_session("user-a").unwrap().is_none());
    assert_eq!(
        gate.authenticate("/v1/orders", &Method::GET, &cookie_headers(&second.token)),
        Err(GateRejection::InvalidSession)
    );
}

#[test]
fn test_session_expires_after_ttl() {
    let clock = ManualClock::default();
    let (manager, db, _temp) = setup(&clock);

    let issued = manager.create_session(&credentials("b@x.com", "p2")).unwrap();

    clock.advance(Duration::minutes(29));
    assert_eq!(
        manager.resolve_session(&issued.token).unwrap().as_deref(),
        Some("user-b")
    );

    clock.advance(Duration::minutes(1));
    assert!(manager.resolve_session(&issued.token).unwrap().is_none());

    // The pointer has no TTL; it outlives the session it names
    assert!(db.exists(&user_key("user-b")).unwrap());

    assert_eq!(db.purge_expired().unwrap(), 1);
    assert!(db.exists(&user_key("user-b")).unwrap());

    // Logging in again works even though the pointer names a dead token
    let again = manager.create_session(&credentials("b@x.com", "p2")).unwrap();
    assert_eq!(
        manager.resolve_session(&again.token).unwrap().as_deref(),
        Some("user-b")
    );
}

#[test]
fn test_sessions_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let token = {
        let manager = SessionManager::new(
            SessionConfig::default(),
            Arc::new(Database::open(temp_dir.path()).unwrap()),
            Arc::new(directory()),
            Arc::new(Argon2Scheme),
        );
        manager
            .create_session(&credentials("a@x.com", "p1"))
            .unwrap()
            .token
    };

    let db = Database::open(temp_dir.path()).unwrap();
    assert_eq!(
        db.get(&session_key(&token)).unwrap().as_deref(),
        Some(b"user-a".as_slice())
    );
}

#[test]
fn test_concurrent_logins_of_different_users() {
    let clock = ManualClock::default();
    let (manager, _db, _temp) = setup(&clock);

    let handles: Vec<_> = [("a@x.com", "p1"), ("b@x.com", "p2")]
        .into_iter()
        .map(|(email, password)| {
            let manager = manager.clone();
            std::thread::spawn(move || manager.create_session(&credentials(email, password)))
        })
        .collect();

    for handle in handles {
        let issued = handle.join().unwrap().unwrap();
        assert_eq!(
            manager.resolve_session(&issued.token).unwrap(),
            Some(issued.user_id.clone())
        );
        assert_eq!(
            manager.current_session(&issued.user_id).unwrap(),
            Some(issued.token)
        );
    }
}

#[tokio::test]
async fn test_http_flow_over_redb() {
    let clock = ManualClock::default();
    let (sessions, db, _temp) = setup(&clock);
    let state = Arc::new(AppState {
        config: Config {
            server: ServerConfig::default(),
            sessions: SessionConfig::default(),
            store: StoreConfig::default(),
            users_file: None,
        },
        gate: AuthGate::new(RouteClassifier::default(), sessions.clone()),
        sessions,
        store: Arc::new(db),
    });
    let app = api::create_router(state);

    let login = Request::builder()
        .method(Method::POST)
        .uri("/v1/auth/session")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"email":"a@x.com","password":"p1"}"#))
        .unwrap();
    let response = app.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let token = body["data"]["session"].as_str().unwrap().to_string();

    let status = |token: String| {
        Request::builder()
            .uri("/v1/auth/session")
            .header(header::COOKIE, format!("session={token}"))
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(status(token.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    clock.advance(Duration::minutes(30));
    let response = app.oneshot(status(token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
