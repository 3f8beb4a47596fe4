//! API key check for the gateway surface.
//!
//! The key is captured into [`AppState`] at startup. A missing key is a
//! deployment mistake and turns every guarded request into a 500 rather
//! than silently opening the gateway.

use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, HttpResponse};
use futures_util::future::LocalBoxFuture;

use crate::server::AppState;
use gateway_models::ErrorEnvelope;

pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

/// Clients present the key either as `Authorization: Bearer <key>` or in
/// the `x-api-key` header.
fn presented_key(req: &ServiceRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    req.headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let expected = req
                .app_data::<web::Data<AppState>>()
                .and_then(|state| state.auth_key.clone());

            let Some(expected) = expected else {
                log::error!("CC_PROXY_AUTH_KEY is not configured; refusing request");
                let response = HttpResponse::InternalServerError().json(ErrorEnvelope::api_error(
                    "Gateway API key is not configured",
                ));
                return Ok(req.into_response(response).map_into_right_body());
            };

            match presented_key(&req) {
                Some(key) if key == expected => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                _ => {
                    let response = HttpResponse::Unauthorized()
                        .json(ErrorEnvelope::authentication("Invalid or missing API key"));
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}
