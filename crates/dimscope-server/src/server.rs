//! Server state and startup

use actix_web::{middleware, web, App, HttpServer};
use dimscope_app::RecordService;
use log::info;

/// Shared by every request
#[derive(Clone)]
pub struct ApiState {
    pub records: RecordService,
    /// Header the identity provider fills with the caller's user id
    pub owner_header: String,
}

impl ApiState {
    pub fn new(records: RecordService, owner_header: impl Into<String>) -> Self {
        Self {
            records,
            owner_header: owner_header.into().to_ascii_lowercase(),
        }
    }
}

/// Serve the API until the process is stopped
pub async fn run_server(state: ApiState, host: &str, port: u16) -> std::io::Result<()> {
    info!(
        "Starting measurement API on {}:{} (identity header: {})",
        host, port, state.owner_header
    );
    let data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::Logger::default())
            .configure(crate::configure_routes)
    })
    .bind((host, port))?
    .run()
    .await?;

    info!("Server stopped.");
    Ok(())
}
