//! Owner-authenticated HTTP API over saved measurements

pub mod handlers;
pub mod identity;
pub mod response;
pub mod server;

use actix_web::web;

pub use identity::AuthenticatedUser;
pub use response::ApiError;
pub use server::{run_server, ApiState};

/// Register every route; expects `web::Data<ApiState>` on the app
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(response::json_config())
        .route("/health", web::get().to(handlers::health))
        .route("/stats", web::get().to(handlers::get_stats))
        .route("/stats/distribution", web::get().to(handlers::get_distribution))
        .service(
            web::resource("/measurements")
                .route(web::get().to(handlers::list_measurements))
                .route(web::post().to(handlers::create_measurement)),
        )
        .service(
            web::resource("/measurements/{id}")
                .route(web::get().to(handlers::get_measurement))
                .route(web::delete().to(handlers::delete_measurement)),
        );
}
