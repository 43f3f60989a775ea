use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::auth::{PasswordHasher, SessionBinder, TokenIssuer};
use crate::configuration::Settings;
use crate::error::{json_error_handler, AppError};
use crate::logger::LoggerMiddleware;
use crate::middleware::SessionAuth;
use crate::routes::{
    create_item, create_organisation, create_user, delete_organisation, get_current_user,
    get_item, get_organisation, get_user, health_check, list_items, login, logout, update_item,
    update_organisation, update_user,
};
use crate::store::Stores;

const JSON_BODY_LIMIT: usize = 16 * 1024;

/// Everything the handlers share, built once per process
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub hasher: PasswordHasher,
    pub issuer: TokenIssuer,
    pub binder: SessionBinder,
}

impl AppState {
    /// # Errors
    /// Returns error if the password hasher cannot be prepared
    pub fn new(stores: Stores, settings: &Settings) -> Result<Self, AppError> {
        let hasher = PasswordHasher::new(settings.application.password_cost)?;
        let issuer = TokenIssuer::new(&settings.jwt);
        let binder = SessionBinder::new(
            stores.sessions.clone(),
            stores.timeout,
            settings.session.clone(),
        );

        Ok(Self {
            stores,
            hasher,
            issuer,
            binder,
        })
    }
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let stores = web::Data::new(state.stores);
    let hasher = web::Data::new(state.hasher);
    let issuer = web::Data::new(state.issuer.clone());
    let binder = web::Data::new(state.binder.clone());
    let auth_binder = state.binder;
    let auth_issuer = state.issuer;

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(
                web::JsonConfig::default()
                    .limit(JSON_BODY_LIMIT)
                    .error_handler(json_error_handler),
            )
            .app_data(stores.clone())
            .app_data(hasher.clone())
            .app_data(issuer.clone())
            .app_data(binder.clone())

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/user", web::post().to(create_user))

            // Protected routes (session + bearer token)
            .service(
                web::scope("")
                    .wrap(SessionAuth::new(auth_binder.clone(), auth_issuer.clone()))
                    .route("/user/current", web::get().to(get_current_user))
                    .route("/user/{id}", web::get().to(get_user))
                    .route("/user/{id}", web::put().to(update_user))
                    .route("/organisation", web::post().to(create_organisation))
                    .route("/organisation/{id}", web::get().to(get_organisation))
                    .route("/organisation/{id}", web::put().to(update_organisation))
                    .route("/organisation/{id}", web::delete().to(delete_organisation))
                    .route("/item", web::post().to(create_item))
                    .route("/items", web::get().to(list_items))
                    .route("/item/{id}", web::get().to(get_item))
                    .route("/item/{id}", web::put().to(update_item)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Purges expired sessions every `every`, starting immediately. Failures
/// are logged and retried on the next tick.
pub fn spawn_session_cleanup(binder: SessionBinder, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match binder.purge_expired().await {
                Ok(0) => tracing::debug!("No expired sessions to purge"),
                Ok(purged) => tracing::info!(purged, "Purged expired sessions"),
                Err(e) => tracing::error!(error = %e, "Expired session purge failed"),
            }
        }
    })
}
