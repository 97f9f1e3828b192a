//! HTTP routes for the web server.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use super::assets::{content_type, StaticAssets};
use super::templates::{ShareView, TemplateEngine};
use crate::share::{CreatedShare, FileName, ShareDuration, ShareError, ShareService, ShareToken};

/// Shared application state.
pub struct AppState {
    pub shares: Arc<ShareService>,
    pub template_engine: TemplateEngine,
    /// Applied to uploads that don't send a `duration` field.
    pub default_duration: ShareDuration,
    latest_share: watch::Sender<Option<String>>,
}

impl AppState {
    pub fn new(shares: Arc<ShareService>, default_duration: ShareDuration) -> Self {
        let (latest_share, _) = watch::channel(None);
        Self {
            shares,
            template_engine: TemplateEngine::default(),
            default_duration,
            latest_share,
        }
    }

    /// Link of the most recent share created through this server.
    pub fn latest_link(&self) -> Option<String> {
        self.latest_share.borrow().clone()
    }

    /// Watch for newly created share links.
    pub fn subscribe_latest(&self) -> watch::Receiver<Option<String>> {
        self.latest_share.subscribe()
    }
}

/// Build the router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::disable()),
        )
        .route("/last-share", get(last_share_handler))
        .route("/share/:token", get(share_page_handler))
        .route("/api/share/:token", get(share_api_handler))
        .route("/download/:token/:filename", get(download_handler))
        .route("/bundle/:token", get(bundle_handler))
        .route("/revoke/:token", post(revoke_handler))
        .route("/assets/*path", get(assets_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error returned by the JSON and download endpoints.
#[derive(Debug)]
pub enum ApiError {
    Share(ShareError),
    BadUpload(MultipartError),
    NoFiles,
    Internal(String),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub kind: &'static str,
}

impl From<ShareError> for ApiError {
    fn from(err: ShareError) -> Self {
        ApiError::Share(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadUpload(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Share(err) => match err {
                ShareError::InvalidName { .. } => StatusCode::BAD_REQUEST,
                ShareError::NotFound { .. } | ShareError::FileNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                ShareError::Revoked { .. } | ShareError::Expired { .. } => StatusCode::GONE,
                ShareError::AlreadyExists { .. } => StatusCode::CONFLICT,
                ShareError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadUpload(err) => err.status(),
            ApiError::NoFiles => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Share(err) => match err {
                ShareError::InvalidName { .. } => "Invalid path".to_string(),
                ShareError::NotFound { .. } => "Invalid or expired link".to_string(),
                ShareError::FileNotFound { .. } => "File not found".to_string(),
                ShareError::Revoked { .. } => "This link has been revoked".to_string(),
                ShareError::Expired { .. } => "This link has expired".to_string(),
                ShareError::AlreadyExists { .. } => "Share already exists".to_string(),
                ShareError::Io { .. } => "Internal server error".to_string(),
            },
            ApiError::BadUpload(err) => err.body_text(),
            ApiError::NoFiles => "No files uploaded".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Share(err) => err.kind(),
            ApiError::BadUpload(_) => "bad_upload",
            ApiError::NoFiles => "no_files",
            ApiError::Internal(_) => "io_failure",
        }
    }

    fn log(&self) {
        match self {
            ApiError::Share(err @ ShareError::Io { .. }) => {
                error!(error = %err, "Share storage failure")
            }
            ApiError::Internal(message) => error!(error = %message, "Internal server error"),
            other => debug!(kind = other.kind(), "Request rejected"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = ErrorBody {
            detail: self.detail(),
            kind: self.kind(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Response of the last-share endpoint.
#[derive(Debug, Serialize)]
struct LastShare {
    link: Option<String>,
}

/// Response of the revoke endpoint.
#[derive(Debug, Serialize)]
struct Revoked {
    token: ShareToken,
    revoked: bool,
}

/// Handler for the sender page.
async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    html_page(
        StatusCode::OK,
        state
            .template_engine
            .render_index(state.shares.public_base_url(), state.default_duration),
    )
}

/// Handler for multipart uploads.
///
/// Each `files` part is streamed to disk as it arrives. The share directory
/// is created on the first valid file name. If the request fails part-way
/// the pending upload is dropped, which removes the share.
async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<CreatedShare>, ApiError> {
    let mut pending = None;
    let mut duration = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("files") => {
                // browsers send an unnamed empty part when nothing was picked
                let Some(file_name) = field.file_name().filter(|n| !n.is_empty()) else {
                    continue;
                };
                let name = FileName::parse(file_name)?;
                if pending.is_none() {
                    pending = Some(state.shares.start_upload().await?);
                }
                if let Some(upload) = pending.as_mut() {
                    upload.add_file(&name, field).await?;
                }
            }
            Some("duration") => duration = Some(ShareDuration::parse(&field.text().await?)),
            other => debug!(field = ?other, "Ignoring unknown upload field"),
        }
    }

    let Some(upload) = pending else {
        return Err(ApiError::NoFiles);
    };
    let created = upload
        .finish(duration.unwrap_or(state.default_duration))
        .await?;
    state.latest_share.send_replace(Some(created.link.clone()));
    Ok(Json(created))
}

/// Handler for the GUI's link polling.
async fn last_share_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LastShare {
        link: state.latest_link(),
    })
}

/// Handler for the receiver page.
async fn share_page_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Response {
    let listing = match ShareToken::parse(&token) {
        Ok(token) => state
            .shares
            .list_files(&token)
            .await
            .map(|listing| ShareView::new(&token, &listing)),
        Err(e) => Err(e),
    };

    match listing {
        Ok(view) => html_page(
            StatusCode::OK,
            state.template_engine.render_share(&view),
        ),
        Err(e) => {
            let gone = e.is_gone();
            let err = ApiError::from(e);
            err.log();
            let status = err.status();
            let page = if gone {
                state.template_engine.render_gone(&err.detail())
            } else {
                state.template_engine.render_not_found(&err.detail())
            };
            html_page(status, page)
        }
    }
}

/// Handler for the JSON listing of a share.
async fn share_api_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<ShareView>, ApiError> {
    let token = ShareToken::parse(&token)?;
    let listing = state.shares.list_files(&token).await?;
    Ok(Json(ShareView::new(&token, &listing)))
}

/// Handler for single-file downloads.
async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path((token, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let token = ShareToken::parse(&token)?;
    let name = FileName::parse(&filename)?;
    let download = state.shares.open_file(&token, &name).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download_content_type(name.as_str()))
        .header(header::CONTENT_LENGTH, download.size_bytes)
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(name.as_str()),
        )
        .body(Body::from_stream(download.stream))
        .map_err(|e| ApiError::Internal(format!("Response build failed: {e}")))
}

/// Handler for the ZIP bundle of a whole share.
async fn bundle_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let token = ShareToken::parse(&token)?;
    let archive = state.shares.bundle(&token).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_LENGTH, archive.size_bytes)
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&format!("{token}.zip")),
        )
        .body(Body::from_stream(archive.stream))
        .map_err(|e| ApiError::Internal(format!("Response build failed: {e}")))
}

/// Handler for revoking a share.
async fn revoke_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let token = ShareToken::parse(&token)?;
    state.shares.revoke(&token).await?;
    Ok(Json(Revoked {
        token,
        revoked: true,
    }))
}

/// Handler for static assets.
async fn assets_handler(Path(path): Path<String>) -> Response {
    match StaticAssets::get(&path) {
        Some(file) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type(&path))],
            file.data,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn html_page(status: StatusCode, rendered: Result<String, minijinja::Error>) -> Response {
    match rendered {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Template error: {}", e),
        )
            .into_response(),
    }
}

/// Guess the content type of a shared file from its name.
pub fn download_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .to_string()
}

/// `Content-Disposition` value that keeps the original name.
///
/// Carries an ASCII fallback in `filename` and the exact UTF-8 name in
/// `filename*`.
pub fn attachment_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(name, NON_ALPHANUMERIC)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    async fn create_test_state() -> (TempDir, Arc<AppState>) {
        let temp_dir = TempDir::new().unwrap();
        let shares = ShareService::open(temp_dir.path(), "http://192.168.1.20:8000")
            .await
            .unwrap();
        let state = AppState::new(Arc::new(shares), ShareDuration::Manual);
        (temp_dir, Arc::new(state))
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_index_handler_returns_html() {
        let (_tmp, state) = create_test_state().await;
        let response = get(build_router(state), "/").await;

        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.contains("text/html"));
    }

    #[tokio::test]
    async fn test_assets_handler_css() {
        let (_tmp, state) = create_test_state().await;
        let response = get(build_router(state), "/assets/styles.css").await;

        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.contains("text/css"));
    }

    #[tokio::test]
    async fn test_assets_handler_not_found() {
        let (_tmp, state) = create_test_state().await;
        let response = get(build_router(state), "/assets/nonexistent.css").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_last_share_starts_empty() {
        let (_tmp, state) = create_test_state().await;
        let response = get(build_router(state), "/last-share").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "link": null })
        );
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let (_tmp, state) = create_test_state().await;
        let response = get(build_router(state), "/api/share/no-such-share").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["detail"], "Invalid or expired link");
        assert_eq!(body["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_unknown_token_page_is_html_404() {
        let (_tmp, state) = create_test_state().await;
        let response = get(build_router(state), "/share/no-such-share").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Invalid or expired link"));
    }

    #[tokio::test]
    async fn test_traversal_token_is_bad_request() {
        let (_tmp, state) = create_test_state().await;
        let response = get(build_router(state), "/bundle/a..b").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["kind"], "invalid_name");
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let (_tmp, state) = create_test_state().await;
        let response = build_router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/revoke/never-created")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ShareError::invalid_name("..", "x"), StatusCode::BAD_REQUEST),
            (ShareError::not_found("t"), StatusCode::NOT_FOUND),
            (ShareError::file_not_found("t", "f"), StatusCode::NOT_FOUND),
            (
                ShareError::Revoked {
                    token: "t".to_string(),
                },
                StatusCode::GONE,
            ),
            (
                ShareError::Expired {
                    token: "t".to_string(),
                },
                StatusCode::GONE,
            ),
            (
                ShareError::AlreadyExists {
                    token: "t".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                ShareError::io("disk", std::io::Error::other("full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_gone_messages_are_distinct() {
        let revoked = ApiError::from(ShareError::Revoked {
            token: "t".to_string(),
        });
        let expired = ApiError::from(ShareError::Expired {
            token: "t".to_string(),
        });
        assert_ne!(revoked.detail(), expired.detail());
    }

    #[test]
    fn test_download_content_type() {
        assert_eq!(download_content_type("Report.PDF"), "application/pdf");
        assert_eq!(download_content_type("photo.jpeg"), "image/jpeg");
        assert_eq!(download_content_type("notes.txt"), "text/plain");
        assert_eq!(download_content_type("Makefile"), "application/octet-stream");
    }

    #[test]
    fn test_attachment_disposition() {
        assert_eq!(
            attachment_disposition("a.txt"),
            "attachment; filename=\"a.txt\"; filename*=UTF-8''a%2Etxt"
        );
        assert_eq!(
            attachment_disposition("résumé \"v2\".pdf"),
            "attachment; filename=\"r_sum_ _v2_.pdf\"; \
             filename*=UTF-8''r%C3%A9sum%C3%A9%20%22v2%22%2Epdf"
        );
    }

    #[tokio::test]
    async fn test_latest_link_is_observable() {
        let (_tmp, state) = create_test_state().await;
        let mut rx = state.subscribe_latest();

        state
            .latest_share
            .send_replace(Some("http://x/share/t".to_string()));

        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().as_deref(),
            Some("http://x/share/t")
        );
        assert_eq!(state.latest_link().as_deref(), Some("http://x/share/t"));
    }
}
