//! Upstream request construction.
//!
//! # Responsibilities
//! - Hold an upstream's base URI and default headers
//! - Rewrite an incoming request onto the upstream
//!
//! # Design Decisions
//! - The matched route prefix is stripped and the rest is joined onto the
//!   upstream base path; the query string is kept as is
//! - Default headers win over client headers of the same name
//! - `Host` and `Connection` are hop-specific and never forwarded

use std::collections::BTreeMap;
use axum::body::Body;
use axum::http::{
    header::{self, HeaderName, HeaderValue},
    uri::PathAndQuery,
    HeaderMap, Request, Uri,
};
use thiserror::Error;

use crate::routing::RoutePath;

/// Error type for upstream construction and request rewriting.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream URI `{uri}`: {reason}")]
    Uri { uri: String, reason: String },

    #[error("invalid header `{0}`")]
    Header(String),

    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),
}

/// An upstream service requests are forwarded to.
#[derive(Debug, Clone)]
pub struct Upstream {
    base: Uri,
    default_headers: HeaderMap,
}

impl Upstream {
    /// Create an upstream from an absolute base URI and default headers.
    pub fn new(base: &str, headers: &BTreeMap<String, String>) -> Result<Self, UpstreamError> {
        let uri_error = |reason: &str| UpstreamError::Uri {
            uri: base.to_string(),
            reason: reason.to_string(),
        };

        let base: Uri = base
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| uri_error(&e.to_string()))?;
        if base.scheme().is_none() || base.authority().is_none() {
            return Err(uri_error("scheme and authority are required"));
        }

        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| UpstreamError::Header(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| UpstreamError::Header(name.as_str().to_string()))?;
            default_headers.insert(name, value);
        }

        Ok(Self { base, default_headers })
    }

    pub fn base(&self) -> &Uri {
        &self.base
    }

    /// Target URI for a request matched on `route`.
    pub fn target_uri(&self, route: &RoutePath, request_uri: &Uri) -> Result<Uri, UpstreamError> {
        let request_path = RoutePath::new(request_uri.path());
        let remainder = request_path
            .parts()
            .into_iter()
            .skip(route.parts().len())
            .collect::<Vec<_>>()
            .join("/");

        let base_path = self.base.path().trim_end_matches('/');
        let mut path = if remainder.is_empty() {
            base_path.to_string()
        } else {
            format!("{base_path}/{remainder}")
        };
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = request_uri.query() {
            path = format!("{path}?{query}");
        }

        let path_and_query = PathAndQuery::try_from(path.as_str()).map_err(|e| UpstreamError::Uri {
            uri: path.clone(),
            reason: e.to_string(),
        })?;

        let mut parts = self.base.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        Uri::from_parts(parts).map_err(|e| UpstreamError::Uri {
            uri: self.base.to_string(),
            reason: e.to_string(),
        })
    }

    /// Rewrite `request` so it can be sent to this upstream.
    pub fn forward_request<B>(
        &self,
        route: &RoutePath,
        request: Request<B>,
    ) -> Result<Request<Body>, UpstreamError>
    where
        B: hyper::body::Body<Data = hyper::body::Bytes> + Send + 'static,
        B::Error: Into<axum::BoxError>,
    {
        let (parts, body) = request.into_parts();
        let uri = self.target_uri(route, &parts.uri)?;

        let mut builder = Request::builder().method(parts.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in parts.headers.iter() {
                if *name == header::HOST || *name == header::CONNECTION {
                    continue;
                }
                headers.append(name.clone(), value.clone());
            }
            for (name, value) in self.default_headers.iter() {
                headers.insert(name.clone(), value.clone());
            }
        }

        Ok(builder.body(Body::new(body))?)
    }
}
