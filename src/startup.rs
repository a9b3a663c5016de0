use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::SessionManager;
use crate::configuration::{ApplicationSettings, RateLimitSettings};
use crate::error::{AppError, ValidationError};
use crate::middleware::{AuthGate, RequestLogger};
use crate::routes::{
    api_health, health_check, list_users, login, logout, refresh_token, signup, signup_info,
};
use crate::security::{security_headers, RateLimiter};

const MAX_JSON_PAYLOAD: usize = 16 * 1024;

pub fn run(
    listener: TcpListener,
    sessions: SessionManager,
    application: ApplicationSettings,
    rate_limit: RateLimitSettings,
) -> Result<Server, std::io::Error> {
    let codec = sessions.codec().clone();
    let sessions = web::Data::new(sessions);
    let application = web::Data::new(application);
    let limiter = web::Data::new(RateLimiter::new(rate_limit));

    let server = HttpServer::new(move || {
        // Unparseable bodies answer like any other validation failure
        let json_config = web::JsonConfig::default()
            .limit(MAX_JSON_PAYLOAD)
            .error_handler(|err, _req| {
                tracing::warn!(error = %err, "Rejected request body");
                AppError::Validation(ValidationError::InvalidFormat("request body".to_string()))
                    .into()
            });

        App::new()
            // Global middleware
            .wrap(security_headers())
            .wrap(Logger::default())
            .wrap(RequestLogger)

            // Shared state
            .app_data(json_config)
            .app_data(sessions.clone())
            .app_data(application.clone())
            .app_data(limiter.clone())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/api/health", web::get().to(api_health))
            .route("/users/signup", web::post().to(signup))
            .route("/users/signup", web::get().to(signup_info))
            .route("/users/login", web::post().to(login))
            .route("/token", web::post().to(refresh_token))
            .route("/logout", web::post().to(logout))

            // Protected routes (require an access token)
            .service(
                web::resource("/users")
                    .wrap(AuthGate::new(codec.clone()))
                    .route(web::get().to(list_users)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
