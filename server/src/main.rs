use docview_server::logger::Logger;
use docview_server::{router, AppState, Config, ServerError};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    if let Err(err) = Logger::init() {
        eprintln!("logger already installed: {err}");
    }

    let config = Config::from_env();
    if !config.content_dir.is_dir() {
        log::error!("content directory {:?} does not exist", config.content_dir);
        return Err(ServerError::NotFound);
    }
    if config.api_key.is_none() {
        log::warn!("DOCVIEW_API_KEY is not set, summary requests will likely be rejected upstream");
    }

    let addr = config.bind_addr();
    let app = router(AppState::new(config));
    let listener = TcpListener::bind(&addr).await?;
    log::info!("docview listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
