use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, http::header};
use futures_util::future::{LocalBoxFuture, ready, Ready};
use std::rc::Rc;

use crate::settings::Settings;

/// Adds a content security policy and the usual hardening headers to every response.
#[derive(Clone)]
pub struct SecurityHeaders {
    pub enable_hsts: bool,
    csp: header::HeaderValue,
}

impl Default for SecurityHeaders {
    fn default() -> Self { Self::new(&[], false) }
}

impl SecurityHeaders {
    /// `media_hosts` are origins story images are hot-linked from; they are admitted in `img-src`.
    pub fn new(media_hosts: &[String], enable_hsts: bool) -> Self {
        let mut img_src = String::from("'self' data:");
        for host in media_hosts.iter().filter(|h| h.chars().all(|c| c.is_ascii_graphic())) {
            img_src.push(' ');
            img_src.push_str(host);
        }
        let policy = format!(
            "default-src 'self'; img-src {img_src}; media-src {img_src}; object-src 'none'; base-uri 'none'; frame-ancestors 'none'; form-action 'self'"
        );
        let csp = header::HeaderValue::from_str(&policy)
            .unwrap_or_else(|_| header::HeaderValue::from_static("default-src 'self'"));
        Self { enable_hsts, csp }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.media_hosts, settings.enable_hsts)
    }
}

impl<S, B> Transform<S, ServiceRequest> for SecurityHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersMiddleware {
            service: Rc::new(service),
            cfg: self.clone(),
        }))
    }
}

pub struct SecurityHeadersMiddleware<S> {
    service: Rc<S>,
    cfg: SecurityHeaders,
}

impl<S, B> Service<ServiceRequest> for SecurityHeadersMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let cfg = self.cfg.clone();
        Box::pin(async move {
            let mut res = svc.call(req).await?;
            let headers = res.response_mut().headers_mut();
            let defaults = [
                (header::CONTENT_SECURITY_POLICY, cfg.csp.clone()),
                (header::REFERRER_POLICY, header::HeaderValue::from_static("strict-origin-when-cross-origin")),
                (header::X_CONTENT_TYPE_OPTIONS, header::HeaderValue::from_static("nosniff")),
                (header::X_FRAME_OPTIONS, header::HeaderValue::from_static("DENY")),
            ];
            for (name, value) in defaults {
                if !headers.contains_key(name.clone()) {
                    headers.insert(name, value);
                }
            }
            if cfg.enable_hsts && !headers.contains_key(header::STRICT_TRANSPORT_SECURITY) {
                headers.insert(header::STRICT_TRANSPORT_SECURITY, header::HeaderValue::from_static("max-age=63072000; includeSubDomains"));
            }
            Ok(res)
        })
    }
}
