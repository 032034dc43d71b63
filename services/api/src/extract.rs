//! Request extractors whose rejections use the service's error shape
//!
//! Axum's stock `Json` and `Query` reject with 415/422 and a plain-text body;
//! these wrappers turn every malformed body or query string into a 400 with
//! the usual `{"error", "fields"}` payload. An identifier segment that is not
//! an integer cannot name a row, so `AppPath` rejects it with 404; mutation
//! handlers take it as a `Result` so the permission check still runs first.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);
