use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockledger_core::UserId;

use crate::app::errors;
use crate::context::ActorContext;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Attach an [`ActorContext`] to every request.
pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let user_id = extract_user_id(req.headers()).map_err(|message| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_user_id", message)
    })?;

    req.extensions_mut().insert(ActorContext::new(user_id));

    Ok(next.run(req).await)
}

fn extract_user_id(headers: &HeaderMap) -> Result<Option<UserId>, String> {
    let Some(header) = headers.get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let value = header
        .to_str()
        .map_err(|_| format!("{USER_ID_HEADER} must be a UUID"))?
        .trim();
    if value.is_empty() {
        return Ok(None);
    }

    value
        .parse::<UserId>()
        .map(Some)
        .map_err(|_| format!("{USER_ID_HEADER} must be a UUID"))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn missing_or_blank_header_is_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_user_id(&headers), Ok(None));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(extract_user_id(&headers), Ok(None));
    }

    #[test]
    fn header_is_parsed_as_user_id() {
        let user = UserId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_ID_HEADER,
            HeaderValue::from_str(&user.to_string()).unwrap(),
        );
        assert_eq!(extract_user_id(&headers), Ok(Some(user)));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(extract_user_id(&headers).is_err());
    }
}
