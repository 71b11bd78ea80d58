use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use crate::error::{reject, UnauthenticatedError};

use super::jwt::{verify_jwt_session, SessionData};

/// Accepts `Token <jwt>` as well as `Bearer <jwt>`.
fn extract_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    match scheme {
        "Token" | "Bearer" => Some(token.trim()).filter(|token| !token.is_empty()),
        _ => None,
    }
}

fn resolve_session(header: Option<&str>, secret: &[u8]) -> Result<SessionData, potion::Error> {
    let token = header
        .and_then(extract_token)
        .ok_or_else(|| UnauthenticatedError::new("Authentication credentials were not provided"))?;

    verify_jwt_session(token, secret).map(SessionData::from)
}

pub fn with_session(
    secret: Arc<[u8]>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move { resolve_session(header.as_deref(), &secret).map_err(reject) }
    })
}

/// Anonymous callers and stale tokens both come through as `None`.
pub fn with_possible_session(
    secret: Arc<[u8]>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = std::convert::Infallible> + Clone {
    warp::header::optional::<String>("authorization")
        .or(warp::any().map(|| None))
        .unify()
        .map(move |header: Option<String>| {
            header
                .as_deref()
                .and_then(|header| resolve_session(Some(header), &secret).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_supported_schemes() {
        assert_eq!(extract_token("Token abc"), Some("abc"));
        assert_eq!(extract_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_token("Basic abc"), None);
        assert_eq!(extract_token("Token "), None);
        assert_eq!(extract_token("abc"), None);
    }
}
