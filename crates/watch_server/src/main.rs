//! Main entry point for the TableDrop watch server.
//! Polls the drops API in the background and serves channel state over REST.

use actix_web::{App, HttpResponse, HttpServer, middleware::Logger, web};

mod config;
mod handlers;
mod watch_manager;

use config::ServerConfig;
use handlers::*;
use watch_manager::WatchManager;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("🚀 Starting TableDrop watch server...");

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("❌ Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    log::info!("🍽️ Watching the drops API at {}", config.api_base_url);

    let mut manager = match WatchManager::new(&config).await {
        Ok(manager) => {
            log::info!("🔔 Watch manager initialized successfully");
            manager
        }
        Err(e) => {
            log::error!("❌ Failed to initialize watch manager: {:#}", e);
            std::process::exit(1);
        }
    };

    manager.start();

    let manager = web::Data::new(manager);

    log::info!("🌐 Server will be available at: http://{}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(manager.clone())
            .wrap(Logger::default())
            .service(
                web::scope("/api")
                    .route("/status", web::get().to(get_status))
                    .route("/refresh", web::post().to(request_refresh))
                    .route("/toasts", web::get().to(get_toasts))
                    .route("/banner", web::get().to(get_banner))
                    .service(
                        web::scope("/notifications")
                            .route("", web::get().to(get_notifications))
                            .route("", web::delete().to(clear_notifications))
                            .route("/read-all", web::post().to(mark_all_notifications_read))
                            .route("/{id}/read", web::post().to(mark_notification_read))
                            .route("/{id}", web::delete().to(dismiss_notification)),
                    )
                    .route("/push-token", web::post().to(register_push_token)),
            )
            .route(
                "/health",
                web::get().to(|| async { HttpResponse::Ok().body("OK") }),
            )
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
