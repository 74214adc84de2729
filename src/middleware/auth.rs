use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt};

use crate::{
    AppState,
    auth::Jwt,
    error::{AppError, CredentialError},
};

/// 校验 `Authorization: JWT <token>`，并把当前用户放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth = req
        .headers()
        .typed_get::<Authorization<Jwt>>()
        .ok_or(CredentialError::NotAuthenticated)?;

    let user_id = state.tokens.verify(auth.0.token())?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(CredentialError::InvalidCredentials)?;

    tracing::debug!(user_id = user.id, "Authenticated request");
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
