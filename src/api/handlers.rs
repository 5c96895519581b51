use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::AppError;
use crate::services::cef::{self, Signature};
use crate::state::AppState;

const CLIENT_ID_HEADER: &str = "x-keyexchange-id";
const LOG_HEADER: &str = "x-keyexchange-log";
const CID_HEADER: &str = "x-keyexchange-cid";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn source_addr(headers: &HeaderMap, connect_info: Option<SocketAddr>) -> Option<std::net::IpAddr> {
    if let Some(xff) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = xff.split(',').next().map(str::trim) {
            if let Ok(ip) = first.parse() {
                return Some(ip);
            }
        }
    }
    connect_info.map(|addr| addr.ip())
}

/// `GET /`. Probes the cache and redirects permanently on success.
pub async fn health(State(state): State<AppState>) -> Result<Response, AppError> {
    state.channels.health_check().await?;
    Err(AppError::MovedPermanently(state.root_redirect.clone()))
}

/// `GET /new_channel`.
pub async fn new_channel(
    State(state): State<AppState>,
    ConnectInfo(connect_info): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let client_id = header_str(&headers, CLIENT_ID_HEADER);
    if !crate::channel::is_valid_client_id(client_id) {
        let source = source_addr(&headers, Some(connect_info));
        cef::log_failure(
            "Invalid X-KeyExchange-Id value for new_channel",
            Signature::InvalidClientId,
            source,
        );
        return Err(AppError::bad_request("INVALID_CLIENT_ID", "invalid client id"));
    }
    let cid = state.channels.create(client_id.expect("validated above")).await?;
    Ok(Json(cid).into_response())
}

/// `GET /{cid}`.
pub async fn get_channel(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    ConnectInfo(connect_info): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let client_id = header_str(&headers, CLIENT_ID_HEADER);
    let source = source_addr(&headers, Some(connect_info));
    let record = state.channels.bind(&cid, client_id, source).await?;

    let if_none_match = header_str(&headers, header::IF_NONE_MATCH.as_str());
    let payload = state.channels.get(&cid, record, if_none_match).await?;

    let mut response = (StatusCode::OK, payload.body).into_response();
    if let Ok(value) = header::HeaderValue::from_str(&payload.etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// `PUT /{cid}`.
pub async fn put_channel(
    State(state): State<AppState>,
    Path(cid): Path<String>,
    ConnectInfo(connect_info): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let client_id = header_str(&headers, CLIENT_ID_HEADER);
    let source = source_addr(&headers, Some(connect_info));
    let record = state.channels.bind(&cid, client_id, source).await?;

    let etag = state.channels.put(&cid, record, &body).await?;

    let mut response = StatusCode::OK.into_response();
    if let Ok(value) = header::HeaderValue::from_str(&etag) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// `DELETE /{cid}`. Idempotent: an already-absent channel is success too.
pub async fn delete_channel(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Result<Response, AppError> {
    state.channels.delete(&cid).await?;
    Ok(StatusCode::OK.into_response())
}

/// `POST /report`.
pub async fn report(
    State(state): State<AppState>,
    ConnectInfo(connect_info): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let client_id = header_str(&headers, CLIENT_ID_HEADER);
    let target_cid = header_str(&headers, CID_HEADER);
    let log_header = header_str(&headers, LOG_HEADER).unwrap_or("");
    let source = source_addr(&headers, Some(connect_info));

    state
        .channels
        .report(client_id, target_cid, log_header, &body, source)
        .await?;

    Ok(StatusCode::OK.into_response())
}
