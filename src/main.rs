use std::sync::Arc;

use chrono::Local;
use novel_scrap::{
    info_time,
    request::HttpFetcher,
    server::{router, AppState},
    Result, BIND_ADDR, DATA_DIR,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();
    let fetcher = Arc::new(HttpFetcher::new()?);
    let app = router(AppState::new(fetcher, DATA_DIR));

    let listener = TcpListener::bind(BIND_ADDR).await?;
    info_time!("Listening on {}", BIND_ADDR);
    axum::serve(listener, app).await?;
    info_time!(start_time, "Full program time:");

    Ok(())
}
