//! Thin HTTP layer over the resolver and renderer.
//!
//! Route parsing, content negotiation, CORS and status mapping live here;
//! everything below the route boundary is synchronous and runs on a
//! blocking thread. Successful documents are streamed: the renderer
//! writes into a channel-backed sink on the blocking thread while axum
//! forwards chunks to the client. A dropped client closes the channel,
//! which surfaces to the renderer as a sink error at the next row.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::error::{OxapiError, Result};
use crate::model::{BoundingBox, parse_id_list};
use crate::predicate::Predicate;
use crate::render::{self, DocumentMeta, Format};
use crate::resolver::{RootQuery, SearchKind, resolve};
use crate::stage::StagingStore;
use crate::store::Store;

pub fn router(store: Arc<Store>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);
    Router::new()
        .route("/api/capabilities", get(capabilities))
        .route("/api/0.6/map", get(map_query))
        .route("/api/0.6/*query", get(entity_query))
        .layer(cors)
        .with_state(store)
}

/// The static capabilities document advertised at `/api/capabilities`.
pub fn capabilities_document() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <osm version=\"{}\" generator=\"{}\" copyright=\"{}\" attribution=\"{}\" license=\"{}\">\n\
         \x20 <api>\n\
         \x20   <version minimum=\"0.6\" maximum=\"0.6\"/>\n\
         \x20   <area maximum=\"0.25\"/>\n\
         \x20   <timeout seconds=\"300\"/>\n\
         \x20 </api>\n\
         </osm>",
        render::WIRE_VERSION,
        render::GENERATOR,
        render::COPYRIGHT,
        render::ATTRIBUTION,
        render::LICENSE
    )
}

async fn capabilities() -> Response {
    (
        [(header::CONTENT_TYPE, Format::Xml.content_type())],
        capabilities_document(),
    )
        .into_response()
}

async fn map_query(
    State(store): State<Arc<Store>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let format = negotiate(&headers);
    let bbox = match params.get("bbox") {
        Some(raw) => match BoundingBox::parse(raw) {
            Ok(bbox) => bbox,
            Err(e) => return error_response(&e),
        },
        None => {
            return error_response(&OxapiError::InvalidInput(
                "map query needs a bbox parameter".into(),
            ));
        }
    };
    run(store, RootQuery::ByBoundingBox(bbox), format).await
}

async fn entity_query(
    State(store): State<Arc<Store>>,
    Path(query): Path<String>,
    headers: HeaderMap,
) -> Response {
    let format = negotiate(&headers);
    let root = match parse_query_path(&query) {
        Ok(root) => root,
        Err(e) => return error_response(&e),
    };
    run(store, root, format).await
}

/// Parses the XAPI-style tail of the URL: `node/1,2`, `way[highway=*]`,
/// `*[amenity=cafe]` and so on.
pub fn parse_query_path(query: &str) -> Result<RootQuery> {
    if let Some(ids) = query.strip_prefix("node/") {
        return Ok(RootQuery::ByPointIds(parse_id_list(ids)?));
    }
    if let Some(ids) = query.strip_prefix("way/") {
        return Ok(RootQuery::ByLineIds(parse_id_list(ids)?));
    }
    if let Some(ids) = query.strip_prefix("relation/") {
        return Ok(RootQuery::ByGroupIds(parse_id_list(ids)?));
    }
    for (prefix, kind) in [
        ("node", SearchKind::Point),
        ("way", SearchKind::Line),
        ("relation", SearchKind::Group),
        ("*", SearchKind::Any),
    ] {
        if let Some(raw) = query.strip_prefix(prefix) {
            if raw.starts_with('[') {
                let predicate = Predicate::compile(raw)?;
                return Ok(RootQuery::ByPredicate { kind, predicate });
            }
        }
    }
    Err(OxapiError::InvalidInput(format!("unrecognized query '{query}'")))
}

fn negotiate(headers: &HeaderMap) -> Format {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if accept.contains("application/json") {
        Format::Json
    } else {
        Format::Xml
    }
}

fn status_for(error: &OxapiError) -> StatusCode {
    match error {
        OxapiError::InvalidInput(_) | OxapiError::BBox(_) => StatusCode::BAD_REQUEST,
        OxapiError::NotFound(_) => StatusCode::NOT_FOUND,
        OxapiError::Store(_) | OxapiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &OxapiError) -> Response {
    let status = status_for(error);
    let msg = format!("{error}");
    warn!(%msg, code = %status.as_u16(), "query error");
    (status, msg).into_response()
}

async fn run(store: Arc<Store>, root: RootQuery, format: Format) -> Response {
    // Resolution happens fully before the first byte goes out, so every
    // resolver error still maps onto a clean status code.
    let resolved = tokio::task::spawn_blocking(move || -> Result<(StagingStore, DocumentMeta)> {
        let session = store.session()?;
        let staging = resolve(&session, &root)?;
        let meta = DocumentMeta {
            timestamp: session.replication_timestamp()?,
            bounds: bounds_of(&root),
        };
        // session drops here, releasing the connection on every path
        Ok((staging, meta))
    })
    .await;
    let (staging, meta) = match resolved {
        Ok(Ok(parts)) => parts,
        Ok(Err(e)) => return error_response(&e),
        Err(e) => {
            warn!(error = %e, "join error");
            return error_response(&OxapiError::Store("worker failed".into()));
        }
    };
    let (tx, rx) = tokio::sync::mpsc::channel::<io::Result<Bytes>>(16);
    tokio::task::spawn_blocking(move || {
        let mut sink = ChannelWriter { tx, buffer: Vec::new() };
        if let Err(e) = render::render(&staging, &meta, format, &mut sink) {
            // headers are long gone; all we can do is stop the stream
            warn!(error = %e, "render aborted");
            return;
        }
        if let Err(e) = io::Write::flush(&mut sink) {
            warn!(error = %e, "render aborted");
        }
    });
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.content_type())
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn bounds_of(root: &RootQuery) -> Option<BoundingBox> {
    match root {
        RootQuery::ByBoundingBox(bbox) => Some(*bbox),
        RootQuery::ByPredicate { predicate, .. } => predicate.bbox(),
        _ => None,
    }
}

/// An `io::Write` sink feeding the response body channel. Backpressure is
/// the channel bound; a dropped receiver reads as a broken pipe, which
/// makes the renderer abort after the row it is on.
struct ChannelWriter {
    tx: tokio::sync::mpsc::Sender<io::Result<Bytes>>,
    buffer: Vec<u8>,
}

const FLUSH_THRESHOLD: usize = 8 * 1024;

impl io::Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() >= FLUSH_THRESHOLD {
            self.flush()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.buffer));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client gone"))
    }
}
