//! HTTP surface
//!
//! Read-only query routes (`/health`, `/api/streams`, `/api/streams/:id`)
//! and the WebSocket upgrade, served from the same listener. Stream
//! mutation has no HTTP route: publish and unpublish require a live socket
//! so ownership is always a connection identity.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use hyper::{header, Body, Method, Request, Response, StatusCode};
use serde_json::json;
use tokio::sync::OwnedSemaphorePermit;

use crate::hub::ConnectionHub;
use crate::registry::{StreamId, StreamRegistry};
use crate::relay::SignalingRelay;
use crate::server::config::ServerConfig;
use crate::server::connection;
use crate::stats::ServerStats;

/// Shared server state handed to every request
#[derive(Clone)]
pub(crate) struct RequestContext {
    pub(crate) config: ServerConfig,
    pub(crate) hub: Arc<ConnectionHub>,
    pub(crate) registry: Arc<StreamRegistry>,
    pub(crate) relay: Arc<SignalingRelay>,
    pub(crate) stats: Arc<ServerStats>,

    /// Connection-limit permit, held for as long as any task serving this
    /// connection (including an upgraded websocket) is alive
    pub(crate) _permit: Option<Arc<OwnedSemaphorePermit>>,
}

/// Route a single request
pub(crate) async fn handle(mut req: Request<Body>, ctx: RequestContext) -> Response<Body> {
    let path = req.uri().path().to_owned();

    if path == ctx.config.websocket_path {
        return upgrade_websocket(&mut req, ctx).await;
    }

    match (req.method(), path.as_str()) {
        (&Method::GET, "/health") => health(&ctx).await,
        (&Method::GET, "/api/streams") => list_streams(&ctx).await,
        (&Method::GET, _) if path.starts_with("/api/streams/") => {
            get_stream(&ctx, &path["/api/streams/".len()..]).await
        }
        _ => json_response(StatusCode::NOT_FOUND, json!({ "error": "Not found" })),
    }
}

async fn upgrade_websocket(req: &mut Request<Body>, ctx: RequestContext) -> Response<Body> {
    if !hyper_tungstenite::is_upgrade_request(req) {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({ "error": "WebSocket upgrade required" }),
        );
    }

    match hyper_tungstenite::upgrade(req, None) {
        Ok((response, websocket)) => {
            tokio::spawn(async move {
                if let Err(e) = connection::serve(websocket, ctx).await {
                    tracing::debug!(error = %e, "WebSocket connection error");
                }
            });
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "WebSocket upgrade failed");
            json_response(
                StatusCode::BAD_REQUEST,
                json!({ "error": "WebSocket upgrade failed" }),
            )
        }
    }
}

/// Health check, the keep-alive pinger's target
async fn health(ctx: &RequestContext) -> Response<Body> {
    json_response(
        StatusCode::OK,
        json!({
            "status": "ok",
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "uptime": ctx.stats.uptime().as_secs(),
            "streams": ctx.registry.stream_count().await,
            "connections": ctx.hub.connection_count().await,
        }),
    )
}

async fn list_streams(ctx: &RequestContext) -> Response<Body> {
    match serde_json::to_value(ctx.registry.list_active().await) {
        Ok(streams) => json_response(StatusCode::OK, streams),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode stream list");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            )
        }
    }
}

async fn get_stream(ctx: &RequestContext, id: &str) -> Response<Body> {
    let stream_id = StreamId::from(id);

    match ctx.registry.get(&stream_id).await {
        Some(snapshot) => match serde_json::to_value(snapshot) {
            Ok(stream) => json_response(StatusCode::OK, stream),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode stream");
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        },
        None => json_response(
            StatusCode::NOT_FOUND,
            json!({ "error": "Stream not found" }),
        ),
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
