/// JWT Authentication Middleware
///
/// Validates the bearer access token from the Authorization header and
/// injects its claims into request extensions for use by route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{AccessTokenIssuer, AuthResponse};
use crate::error::TokenError;

/// JWT middleware for protecting routes
///
/// Must be applied to routes that require authentication.
pub struct JwtMiddleware {
    issuer: AccessTokenIssuer,
}

impl JwtMiddleware {
    pub fn new(issuer: AccessTokenIssuer) -> Self {
        Self { issuer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            issuer: self.issuer.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    issuer: AccessTokenIssuer,
}

/// Reject with the same `{success, message}` body the auth endpoints use
fn unauthorized(message: &str) -> Error {
    let response = HttpResponse::Unauthorized().json(AuthResponse {
        success: false,
        ..AuthResponse::message(message)
    });
    actix_web::error::InternalError::from_response("Unauthorized", response).into()
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
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
        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_owned);

        let Some(token) = token else {
            tracing::warn!(path = %req.path(), "Missing or invalid Authorization header");
            return Box::pin(async { Err(unauthorized("Missing or invalid authorization header")) });
        };

        match self.issuer.validate(&token) {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.sub, "Access token validated");
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => {
                let message = match &e {
                    TokenError::Expired => "Access token expired",
                    _ => "Invalid access token",
                };
                tracing::warn!(path = %req.path(), error = %e, "Access token rejected");
                Box::pin(async move { Err(unauthorized(message)) })
            }
        }
    }
}
