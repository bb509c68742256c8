use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use serde::Serialize;
use warp::http::{Method, StatusCode};
use warp::hyper::body::Bytes;
use warp::path::FullPath;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::FaceStore;
use crate::error::ApiError;
use crate::model::{CreatedId, NewFace};

/// Largest create body accepted, checked against `Content-Length` before the body is read.
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub struct FaceServer {
    store: Arc<FaceStore>,
}

impl FaceServer {
    pub fn new(store: Arc<FaceStore>) -> Self {
        Self { store }
    }

    /// Serves until `shutdown` resolves. Fails only if `addr` cannot be bound.
    pub async fn run<S>(&self, addr: SocketAddr, shutdown: S) -> Result<(), warp::Error>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let (bound, server) = warp::serve(routes(self.store.clone()))
        .try_bind_with_graceful_shutdown(addr, shutdown)?;

        tracing::info!("FaceStore listening on http://{}", bound);
        server.await;
        tracing::info!("FaceStore stopped ({} faces dropped)", self.store.len());
        Ok(())
    }
}

/// The whole HTTP surface: `/face/`, `/tag/` and `/due/`, with errors rendered as JSON.
pub fn routes(store: Arc<FaceStore>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    // /face/ and /face/<id>
    let face = warp::path("face")
    .and(warp::path::full())
    .and(warp::method())
    .and(warp::header::optional::<String>("content-type"))
    .and(body_within_limit())
    .and(warp::body::bytes())
    .and(with_store(store.clone()))
    .and_then(|path: FullPath, method: Method, content_type: Option<String>, body: Bytes, store: Arc<FaceStore>| async move {
        face_handler(path.as_str(), &method, content_type.as_deref(), &body, &store)
        .map_err(warp::reject::custom)
    });

    // /tag/<tag>
    let tag = warp::path("tag")
    .and(warp::path::full())
    .and(warp::method())
    .and(with_store(store.clone()))
    .and_then(|path: FullPath, method: Method, store: Arc<FaceStore>| async move {
        tag_handler(path.as_str(), &method, &store).map_err(warp::reject::custom)
    });

    // /due/<year>/<month>/<day>
    let due = warp::path("due")
    .and(warp::path::full())
    .and(warp::method())
    .and(with_store(store))
    .and_then(|path: FullPath, method: Method, store: Arc<FaceStore>| async move {
        due_handler(path.as_str(), &method, &store).map_err(warp::reject::custom)
    });

    face.or(tag).unify()
    .or(due).unify()
    .with(warp::trace::request())
    .recover(handle_rejection)
}

fn with_store(store: Arc<FaceStore>) -> impl Filter<Extract = (Arc<FaceStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

// Rejects oversized or unsized POST bodies before `warp::body::bytes()` buffers them.
fn body_within_limit() -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::path::full()
    .and(warp::method())
    .and(warp::header::optional::<u64>("content-length"))
    .and_then(|path: FullPath, method: Method, length: Option<u64>| async move {
        check_body_length(path.as_str(), &method, length).map_err(warp::reject::custom)
    })
    .untuple_one()
}

fn check_body_length(path: &str, method: &Method, length: Option<u64>) -> Result<(), ApiError> {
    let is_create = method == Method::POST && path_parts(path).len() < 2;

    match length {
        Some(n) if n > MAX_BODY_BYTES => Err(ApiError::PayloadTooLarge(format!(
            "request body of {} bytes exceeds the {} byte limit",
            n, MAX_BODY_BYTES
        ))),
        None if is_create => Err(ApiError::LengthRequired("expect a Content-Length header".to_string())),
        _ => Ok(()),
    }
}

fn path_parts(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').collect()
}

// --- HANDLERS ---

fn face_handler(
    path: &str,
    method: &Method,
    content_type: Option<&str>,
    body: &[u8],
    store: &FaceStore,
) -> Result<Response, ApiError> {
    let parts = path_parts(path);

    // Plain /face/, no trailing id
    if parts.len() < 2 {
        return match *method {
            Method::POST => create_face(path, content_type, body, store),
            Method::GET => {
                tracing::info!("handling get all faces at {}", path);
                Ok(warp::reply::json(&store.list_all()).into_response())
            }
            Method::DELETE => {
                tracing::info!("handling delete all faces at {}", path);
                store.delete_all();
                Ok(StatusCode::OK.into_response())
            }
            _ => Err(ApiError::MethodNotAllowed(format!(
                "expect method GET, DELETE or POST at /face/, got {}",
                method
            ))),
        };
    }

    let id: u64 = parts[1]
    .parse()
    .map_err(|e| ApiError::BadRequest(format!("invalid face id {:?}: {}", parts[1], e)))?;

    match *method {
        Method::GET => {
            tracing::info!("handling get face at {}", path);
            let face = store.get(id)?;
            Ok(warp::reply::json(&face).into_response())
        }
        Method::DELETE => {
            tracing::info!("handling delete face at {}", path);
            store.delete(id)?;
            Ok(StatusCode::OK.into_response())
        }
        _ => Err(ApiError::MethodNotAllowed(format!(
            "expect method GET or DELETE at /face/<id>, got {}",
            method
        ))),
    }
}

fn create_face(path: &str, content_type: Option<&str>, body: &[u8], store: &FaceStore) -> Result<Response, ApiError> {
    tracing::info!("handling face create at {}", path);

    check_json_content_type(content_type)?;

    let new_face: NewFace = serde_json::from_slice(body)
    .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let id = store.create(&new_face.text, &new_face.tags, new_face.due);
    Ok(warp::reply::json(&CreatedId { id }).into_response())
}

/// Accepts `application/json`, ignoring media type parameters such as charset.
fn check_json_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    let raw = content_type.unwrap_or("").trim();
    let media_type = raw.split(';').next().unwrap_or("").trim();

    if !is_media_type(media_type) {
        return Err(ApiError::BadRequest(format!("malformed Content-Type {:?}", raw)));
    }
    if !media_type.eq_ignore_ascii_case("application/json") {
        return Err(ApiError::UnsupportedMediaType("expect application/json Content-Type".to_string()));
    }
    Ok(())
}

// type "/" subtype, both non-empty RFC 7230 tokens
fn is_media_type(s: &str) -> bool {
    let is_token = |part: &str| {
        !part.is_empty()
            && part.chars().all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
    };
    match s.split_once('/') {
        Some((kind, subtype)) => is_token(kind) && is_token(subtype),
        None => false,
    }
}

fn tag_handler(path: &str, method: &Method, store: &FaceStore) -> Result<Response, ApiError> {
    tracing::info!("handling faces by tag at {}", path);

    if method != Method::GET {
        return Err(ApiError::MethodNotAllowed(format!("expect method GET /tag/<tag>, got {}", method)));
    }

    let parts = path_parts(path);
    if parts.len() < 2 || parts[1].is_empty() {
        return Err(ApiError::BadRequest("expect /tag/<tag> path".to_string()));
    }
    let tag = urlencoding::decode(parts[1])
    .map_err(|e| ApiError::BadRequest(format!("invalid tag encoding: {}", e)))?;

    Ok(warp::reply::json(&store.list_by_tag(&tag)).into_response())
}

fn due_handler(path: &str, method: &Method, store: &FaceStore) -> Result<Response, ApiError> {
    tracing::info!("handling faces by due at {}", path);

    if method != Method::GET {
        return Err(ApiError::MethodNotAllowed(format!("expect method GET /due/<date>, got {}", method)));
    }

    let bad_request = || ApiError::BadRequest(format!("expect /due/<year>/<month>/<day>, got {}", path));

    let parts = path_parts(path);
    if parts.len() != 4 {
        return Err(bad_request());
    }

    let year: i32 = parts[1].parse().map_err(|_| bad_request())?;
    let month: u32 = parts[2].parse().map_err(|_| bad_request())?;
    if !(1..=12).contains(&month) {
        return Err(bad_request());
    }
    let day: u32 = parts[3].parse().map_err(|_| bad_request())?;

    Ok(warp::reply::json(&store.list_by_due_date(year, month, day)).into_response())
}

// --- REJECTIONS ---

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(e) = err.find::<ApiError>() {
        (e.status(), e.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else {
        tracing::warn!("unhandled rejection: {:?}", err);
        (StatusCode::BAD_REQUEST, "malformed request".to_string())
    };

    if status.is_client_error() && status != StatusCode::NOT_FOUND {
        tracing::debug!("rejecting request with {}: {}", status, message);
    }

    let body = warp::reply::json(&ErrorBody { error: message });
    Ok(warp::reply::with_status(body, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_parameters_are_ignored() {
        assert!(check_json_content_type(Some("application/json")).is_ok());
        assert!(check_json_content_type(Some("application/json; charset=utf-8")).is_ok());
        assert!(check_json_content_type(Some("Application/JSON")).is_ok());
    }

    #[test]
    fn content_type_errors() {
        assert!(matches!(check_json_content_type(None), Err(ApiError::BadRequest(_))));
        assert!(matches!(check_json_content_type(Some("")), Err(ApiError::BadRequest(_))));
        assert!(matches!(check_json_content_type(Some("text/plain")), Err(ApiError::UnsupportedMediaType(_))));
    }

    #[test]
    fn malformed_media_types_are_bad_requests() {
        for raw in ["application/json/x", "application", "/json", "application/", "application /json", "application/js on"] {
            assert!(matches!(check_json_content_type(Some(raw)), Err(ApiError::BadRequest(_))), "{}", raw);
        }
        assert!(is_media_type("application/vnd.api+json"));
    }

    #[test]
    fn body_length_limit() {
        assert_eq!(check_body_length("/face/", &Method::POST, Some(MAX_BODY_BYTES)), Ok(()));
        assert!(matches!(check_body_length("/face/", &Method::POST, Some(MAX_BODY_BYTES + 1)), Err(ApiError::PayloadTooLarge(_))));
        assert!(matches!(check_body_length("/face", &Method::POST, None), Err(ApiError::LengthRequired(_))));
        assert_eq!(check_body_length("/face/3", &Method::POST, None), Ok(()));
        assert_eq!(check_body_length("/face/", &Method::GET, None), Ok(()));
        assert_eq!(check_body_length("/face/3", &Method::DELETE, Some(0)), Ok(()));
    }

    #[test]
    fn path_parts_ignores_surrounding_slashes() {
        assert_eq!(path_parts("/face/"), vec!["face"]);
        assert_eq!(path_parts("/face/12"), vec!["face", "12"]);
        assert_eq!(path_parts("/due/2024/5/1/"), vec!["due", "2024", "5", "1"]);
    }
}
