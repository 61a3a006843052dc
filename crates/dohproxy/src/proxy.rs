//! The `/dns-query` endpoint (RFC 8484, POST only): unpack the body,
//! exchange with the upstream resolver, write back the packed reply.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use burrow_dns_core::codec;
use burrow_dns_core::{exchange, exchange_tls, MAX_MSG_SIZE, MEDIA_TYPE};
use std::sync::Arc;
use tracing::{debug, warn};

/// The resolver every query is forwarded to.
#[derive(Clone, Debug)]
pub struct Upstream {
    pub addr: String,
    pub use_tls: bool,
}

pub fn router(upstream: Upstream) -> Router {
    Router::new()
        .route("/dns-query", post(dns_query).get(dns_query_get))
        .with_state(Arc::new(upstream))
}

async fn dns_query_get() -> Response {
    (
        StatusCode::NOT_IMPLEMENTED,
        "GET is not implemented; POST the query\n",
    )
        .into_response()
}

async fn dns_query(
    State(upstream): State<Arc<Upstream>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        if content_type.as_bytes() != MEDIA_TYPE.as_bytes() {
            let detail = format!("unsupported media type {}", String::from_utf8_lossy(content_type.as_bytes()));
            warn!("{detail}");
            return (StatusCode::UNSUPPORTED_MEDIA_TYPE, detail).into_response();
        }
    }

    if let Some(content_length) = headers.get(header::CONTENT_LENGTH) {
        let length: usize = match content_length.to_str().ok().and_then(|s| s.parse().ok()) {
            Some(length) => length,
            None => {
                warn!("unparseable Content-Length header");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "parse Content-Length: not a number\n",
                )
                    .into_response();
            }
        };
        if length > MAX_MSG_SIZE {
            let detail = format!("content length {length} larger than permitted {MAX_MSG_SIZE}");
            warn!("{detail}");
            return (StatusCode::PAYLOAD_TOO_LARGE, detail).into_response();
        }
    }

    let qmsg = match codec::unpack(&body) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "unpack query");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("unpack query: {e}"),
            )
                .into_response();
        }
    };

    debug!(id = qmsg.id(), upstream = %upstream.addr, tls = upstream.use_tls, "forwarding query");
    let resolved = if upstream.use_tls {
        exchange_tls(&qmsg, &upstream.addr).await
    } else {
        exchange(&qmsg, &upstream.addr).await
    };
    let resolved = match resolved {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, upstream = %upstream.addr, "upstream exchange failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
        }
    };

    match codec::pack(&resolved) {
        Ok(packed) => ([(header::CONTENT_TYPE, MEDIA_TYPE)], packed).into_response(),
        Err(e) => {
            warn!(error = %e, "pack resolved reply");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("pack resolved reply: {e}"),
            )
                .into_response();
        }
    }
}
