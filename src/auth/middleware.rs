use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::state::AppState;
use crate::auth::jwt;
use crate::domain::KanbanError;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, KanbanError> {
    let token = extract_token(&req)
        .ok_or_else(|| KanbanError::Unauthorized("missing bearer token".into()))?;

    let claims = jwt::verify_token(state.config.jwt_secret.as_bytes(), &token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        KanbanError::Unauthorized("invalid or expired token".into())
    })?;

    req.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
    });

    Ok(next.run(req).await)
}

/// Bearer header first; `?token=` for EventSource clients that cannot set headers.
fn extract_token(req: &Request) -> Option<String> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);

    auth_header.or_else(|| {
        req.uri().query().and_then(|query| {
            query
                .split('&')
                .filter_map(|part| {
                    let mut split = part.splitn(2, '=');
                    let key = split.next()?;
                    let value = split.next().unwrap_or_default();
                    Some((key, value))
                })
                .find(|(key, value)| *key == "token" && !value.is_empty())
                .map(|(_, value)| value.to_string())
        })
    })
}
