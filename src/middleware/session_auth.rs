/// Session + Bearer Token Authorization Middleware
///
/// Guards protected routes. A request passes only if BOTH hold:
/// 1. its session cookie points at an authenticated, unexpired session
/// 2. its `Authorization: Bearer` token verifies and names the same user
///
/// The first failing check ends the request with a 401. Nothing is
/// written to the store here.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::{SessionBinder, SessionKey, TokenIssuer};
use crate::error::{AppError, AuthError};

/// Identity attached to request extensions once a request is authorized
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

pub struct SessionAuth {
    binder: SessionBinder,
    issuer: TokenIssuer,
}

impl SessionAuth {
    pub fn new(binder: SessionBinder, issuer: TokenIssuer) -> Self {
        Self { binder, issuer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionAuthService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SessionAuthService {
            service: Rc::new(service),
            binder: self.binder.clone(),
            issuer: self.issuer.clone(),
        }))
    }
}

pub struct SessionAuthService<S> {
    service: Rc<S>,
    binder: SessionBinder,
    issuer: TokenIssuer,
}

impl<S, B> Service<ServiceRequest> for SessionAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let binder = self.binder.clone();
        let issuer = self.issuer.clone();

        Box::pin(async move {
            match authorize(&req, &binder, &issuer).await {
                Ok(user) => {
                    tracing::debug!(user_id = %user.user_id, "Request authorized");
                    req.extensions_mut().insert(user);
                    service.call(req).await
                }
                Err(e) => {
                    tracing::warn!(path = %req.path(), error = %e, "Request rejected by auth middleware");
                    Err(e.into())
                }
            }
        })
    }
}

async fn authorize(
    req: &ServiceRequest,
    binder: &SessionBinder,
    issuer: &TokenIssuer,
) -> Result<AuthenticatedUser, AppError> {
    // Session: must exist, be authenticated and not expired
    let key = req
        .cookie(binder.cookie_name())
        .and_then(|cookie| SessionKey::parse(cookie.value()));
    let session = match key {
        Some(key) => binder.current(&key).await?,
        None => None,
    };
    let session = session
        .filter(|session| session.is_active(Utc::now()))
        .ok_or(AuthError::NotLoggedIn)?;

    // Bearer token: present, well-formed, verified
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::TokenInvalid)?;
    let claims = issuer.verify(token)?;

    // Both must name the same user
    let session_user = session.user_id.ok_or(AuthError::TokenUserMismatch)?;
    let token_user = claims.user_id()?;
    if token_user != session_user {
        return Err(AuthError::TokenUserMismatch.into());
    }

    Ok(AuthenticatedUser {
        user_id: session_user,
    })
}
