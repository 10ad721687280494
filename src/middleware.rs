use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::cart::SessionId;

pub const SESSION_HEADER: &str = "x-session-id";
pub const SESSION_COOKIE: &str = "bookbazaar_session";

fn from_header(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(SESSION_HEADER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn from_cookie(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| value.trim_matches('"').parse().ok())
}

/// Binds the request to a shopper session.
///
/// The session id comes from the `x-session-id` header or, for plain browser
/// form posts such as the payment callback, from the session cookie. A new one
/// is minted when neither carries a valid id. Handlers receive it as
/// `Extension<SessionId>` and the response hands it back in both places.
pub async fn session(mut req: Request, next: Next) -> Response {
    let session = from_header(req.headers())
        .or_else(|| from_cookie(req.headers()))
        .unwrap_or_else(|| {
            let session = SessionId::new();
            debug!(%session, "Started new shopper session");
            session
        });

    req.extensions_mut().insert(session);
    let mut res = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&session.to_string()) {
        res.headers_mut().insert(SESSION_HEADER, value);
    }
    let cookie = format!("{SESSION_COOKIE}={session}; Path=/; HttpOnly; SameSite=Lax");
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        res.headers_mut().append(header::SET_COOKIE, value);
    }
    res
}
