use std::collections::{HashMap, HashSet};

use axum::http::Method;

pub const USER_ROUTE: &str = "/v1/user";
pub const AUTH_SESSION_ROUTE: &str = "/v1/auth/session";

/// Exact-match table of `(path, method)` pairs that skip authentication.
///
/// Built once at startup and never mutated. Anything not listed, including
/// paths no router knows about, requires a session.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    bypass: HashMap<String, HashSet<Method>>,
}

impl RouteClassifier {
    pub fn new<I, P>(routes: I) -> Self
    where
        I: IntoIterator<Item = (P, Method)>,
        P: Into<String>,
    {
        let mut bypass: HashMap<String, HashSet<Method>> = HashMap::new();
        for (path, method) in routes {
            bypass.entry(path.into()).or_default().insert(method);
        }
        Self { bypass }
    }

    /// Whether `(path, method)` is registered as public.
    pub fn bypasses(&self, path: &str, method: &Method) -> bool {
        self.bypass
            .get(path)
            .is_some_and(|methods| methods.contains(method))
    }
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::new([
            (USER_ROUTE, Method::POST),         // account creation
            (AUTH_SESSION_ROUTE, Method::POST), // login
        ])
    }
}
