//! Route guard: which view a user may see given the session

use crate::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Chat,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Chat => "/chat",
        }
    }

    /// Unknown paths (and `/`) map to nothing; the guard picks the fallback.
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "/login" => Some(Route::Login),
            "/register" => Some(Route::Register),
            "/chat" => Some(Route::Chat),
            _ => None,
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::Chat)
    }

    /// Where a user lands when nothing specific was asked for
    pub fn home(authenticated: bool) -> Self {
        if authenticated {
            Route::Chat
        } else {
            Route::Login
        }
    }
}

pub fn is_authenticated(session: &SessionStore) -> bool {
    session.is_authenticated()
}

/// The route actually shown when `requested` is asked for
pub fn guard_for(requested: Route, authenticated: bool) -> Route {
    match (requested.requires_auth(), authenticated) {
        (true, false) => Route::Login,
        (false, true) => Route::Chat,
        _ => requested,
    }
}

pub fn guard(requested: Route, session: &SessionStore) -> Route {
    guard_for(requested, is_authenticated(session))
}

/// Guard a raw path, falling back to the home route for unknown paths
pub fn resolve_path(path: &str, session: &SessionStore) -> Route {
    let authenticated = is_authenticated(session);
    match Route::from_path(path) {
        Some(route) => guard_for(route, authenticated),
        None => Route::home(authenticated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_table() {
        assert_eq!(guard_for(Route::Chat, false), Route::Login);
        assert_eq!(guard_for(Route::Chat, true), Route::Chat);
        assert_eq!(guard_for(Route::Login, false), Route::Login);
        assert_eq!(guard_for(Route::Register, false), Route::Register);
        assert_eq!(guard_for(Route::Login, true), Route::Chat);
        assert_eq!(guard_for(Route::Register, true), Route::Chat);
    }

    #[test]
    fn test_guard_follows_session() {
        let session = SessionStore::in_memory();
        assert_eq!(guard(Route::Chat, &session), Route::Login);

        session.set("token");
        assert_eq!(guard(Route::Login, &session), Route::Chat);

        session.clear();
        assert_eq!(guard(Route::Chat, &session), Route::Login);
    }

    #[test]
    fn test_resolve_path() {
        let session = SessionStore::in_memory();
        assert_eq!(resolve_path("/", &session), Route::Login);
        assert_eq!(resolve_path("/register/", &session), Route::Register);
        assert_eq!(resolve_path("/nowhere", &session), Route::Login);

        session.set("token");
        assert_eq!(resolve_path("/", &session), Route::Chat);
        assert_eq!(resolve_path("/login", &session), Route::Chat);
    }

    #[test]
    fn test_path_round_trip() {
        for route in [Route::Login, Route::Register, Route::Chat] {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
    }
}
