/// HTTP handlers for image-converter
pub mod events;
pub mod health;

pub use events::receive_event;
pub use health::{health, live, ready};

use actix_web::web;

/// Register every route on an actix app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::post().to(receive_event))
        .route("/health", web::get().to(health))
        .route("/health/live", web::get().to(live))
        .route("/health/ready", web::get().to(ready));
}
