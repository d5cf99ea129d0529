use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;
use vetcare_api::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    // If the incoming request already has a request-id, preserve it; otherwise generate one
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    let Some(req_id_value) = req_id_value else {
        return next.run(req).await;
    };

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

// Write requests must carry a JSON body. A missing Content-Type is accepted
// so that simple form-less clients keep working.
pub async fn content_negotiation(req: Request<Body>, next: Next) -> Response {
    let is_write = matches!(*req.method(), Method::POST | Method::PUT);
    if is_write {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());
        if let Some(ct) = content_type {
            if !ct.starts_with("application/json") {
                return ApiError::unsupported_media_type(format!(
                    "Content-Type must be application/json, got '{ct}'"
                ))
                .into_response();
            }
        }
    }
    next.run(req).await
}
