//! HTTP front end: `GET /ping` and `POST /scrape {"url": ...}` returning the EPUB.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::Deserialize;

use crate::book::BookWriter;
use crate::novel::Novel;
use crate::request::Fetch;
use crate::{info_time, warn_time, Error, Result, CONCURRENCY};

pub struct AppState {
    fetcher: Arc<dyn Fetch>,
    writer: BookWriter,
    data_dir: PathBuf,
    concurrency: usize,
    requests: AtomicU64,
}

impl AppState {
    pub fn new(fetcher: Arc<dyn Fetch>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            writer: BookWriter::default(),
            data_dir: data_dir.into(),
            concurrency: CONCURRENCY,
            requests: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    url: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/scrape", post(scrape))
        .with_state(Arc::new(state))
}

async fn ping() -> &'static str {
    "Ok"
}

async fn scrape(State(state): State<Arc<AppState>>, Json(req): Json<ScrapeRequest>) -> Response {
    let Some(url) = req.url.filter(|url| !url.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing url in request").into_response();
    };

    let start_time = Local::now();
    match produce(&state, &url).await {
        Ok((file_name, bytes)) => {
            info_time!(start_time, "Scraped {} into {}", url, file_name);
            let disposition = format!("attachment; filename=\"{}\"", ascii_name(&file_name));
            (
                [
                    (header::CONTENT_TYPE, "application/epub+zip".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(err) => failure(&url, err).into_response(),
    }
}

/// Every request gets its own directory under the data dir, made once the source has been read.
async fn produce(state: &AppState, url: &str) -> Result<(String, Vec<u8>)> {
    let mut novel = Novel::discover(url, state.fetcher.clone(), state.concurrency).await?;

    let request_id = state.requests.fetch_add(1, Ordering::Relaxed);
    let dir = state
        .data_dir
        .join(format!("{}-{}", Local::now().timestamp_millis(), request_id));
    tokio::fs::create_dir_all(&dir).await?;

    let file_name = novel.produce_book(&state.writer, &dir, false).await?;
    let bytes = tokio::fs::read(dir.join(&file_name)).await?;
    Ok((file_name, bytes))
}

fn failure(url: &str, err: Error) -> (StatusCode, &'static str) {
    let (status, message) = if err.is_discovery() {
        (StatusCode::BAD_GATEWAY, "Failed to read novel source")
    } else if err.is_retrieval() {
        (StatusCode::BAD_GATEWAY, "Failed to retrieve chapters")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to scrape book")
    };
    warn_time!("{} for {}: {}", message, url, err);
    (status, message)
}

/// Header values have to be visible ASCII.
fn ascii_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .map(|c| if c == '"' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::request::tests::FakeSite;

    const URL: &str = "https://site/series/road/";

    fn app(site: FakeSite, dir: &std::path::Path) -> Router {
        router(AppState::new(Arc::new(site), dir))
    }

    fn scrape_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/scrape")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn ping_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(FakeSite::default(), dir.path())
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Ok");
    }

    #[tokio::test]
    async fn missing_url_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(FakeSite::default(), dir.path())
            .oneshot(scrape_request("{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Missing url in request");
    }

    #[tokio::test]
    async fn unreachable_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({ "url": URL }).to_string();
        let response = app(FakeSite::default(), dir.path())
            .oneshot(scrape_request(&body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_text(response).await, "Failed to read novel source");
    }

    #[tokio::test]
    async fn failed_discovery_leaves_no_request_dir() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({ "url": URL }).to_string();
        let app = app(FakeSite::default(), dir.path());

        for _ in 0..2 {
            let response = app.clone().oneshot(scrape_request(&body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_chapter_is_reported() {
        let site = FakeSite::default().page(
            URL,
            r#"<div class="seriestitlenew">Road</div><table id="myTable"><tbody>
               <tr><td>01/01/21</td><td><a>A</a></td><td><a class="chp-release" href="//site/gone">c1</a></td></tr>
               </tbody></table>"#,
        );
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({ "url": URL }).to_string();
        let response = app(site, dir.path()).oneshot(scrape_request(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_text(response).await, "Failed to retrieve chapters");
    }

    #[tokio::test]
    async fn returns_the_book() {
        let site = FakeSite::default()
            .page(
                URL,
                r#"<div class="seriestitlenew">Road</div><table id="myTable"><tbody>
                   <tr><td>01/01/21</td><td><a>A</a></td><td><a class="chp-release" href="//site/c1">c1</a></td></tr>
                   </tbody></table>"#,
            )
            .page("https://site/c1", "<p>hello</p>");
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({ "url": URL }).to_string();

        let response = app(site, dir.path()).oneshot(scrape_request(&body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/epub+zip"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Road.epub\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn header_names_are_ascii() {
        assert_eq!(ascii_name("Caf\u{e9} \"x\".epub"), "Caf_ _x_.epub");
    }
}
