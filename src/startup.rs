use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AccessTokenIssuer, AuthService, PasswordHasher, RefreshTokenManager};
use crate::configuration::Settings;
use crate::error::AuthError;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::player::PlayerService;
use crate::routes::{
    create_match, get_leaderboard, get_match, get_matches, get_stats, health_check, login, logout,
    ping, refresh, register,
};
use crate::store::{
    InMemoryStore, PgPlayerStore, PgRefreshTokenStore, PgUserStore, PlayerStore,
    RefreshTokenStore, UserStore,
};

/// Services shared by every worker
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub players: PlayerService,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        players: Arc<dyn PlayerStore>,
        settings: &Settings,
    ) -> Result<Self, AuthError> {
        let auth = AuthService::new(
            users,
            RefreshTokenManager::new(refresh_tokens, &settings.jwt),
            AccessTokenIssuer::new(&settings.jwt),
            PasswordHasher::new(settings.password.bcrypt_cost)?,
        );

        Ok(Self {
            auth,
            players: PlayerService::new(players),
        })
    }

    /// Backed by Postgres through `pool`
    pub fn postgres(pool: PgPool, settings: &Settings) -> Result<Self, AuthError> {
        Self::new(
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(PgRefreshTokenStore::new(pool.clone())),
            Arc::new(PgPlayerStore::new(pool)),
            settings,
        )
    }

    /// Backed by a single in-process store
    pub fn in_memory(settings: &Settings) -> Result<Self, AuthError> {
        let store = Arc::new(InMemoryStore::new());
        Self::new(store.clone(), store.clone(), store, settings)
    }
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let issuer = state.auth.access_tokens().clone();
    let auth = web::Data::new(state.auth);
    let players = web::Data::new(state.players);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(auth.clone())
            .app_data(players.clone())
            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .route("/api/test/ping", web::get().to(ping))
            .service(
                web::scope("/api/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    // Protected routes (require JWT authentication)
                    .service(
                        web::resource("/logout")
                            .wrap(JwtMiddleware::new(issuer.clone()))
                            .route(web::post().to(logout)),
                    ),
            )
            .service(
                web::scope("/api/player")
                    .route("/leaderboard", web::get().to(get_leaderboard))
                    .service(
                        web::resource("/stats")
                            .wrap(JwtMiddleware::new(issuer.clone()))
                            .route(web::get().to(get_stats)),
                    )
                    .service(
                        web::resource("/match")
                            .wrap(JwtMiddleware::new(issuer.clone()))
                            .route(web::post().to(create_match)),
                    )
                    .service(
                        web::resource("/matches")
                            .wrap(JwtMiddleware::new(issuer.clone()))
                            .route(web::get().to(get_matches)),
                    )
                    .service(
                        web::resource("/match/{match_id}")
                            .wrap(JwtMiddleware::new(issuer.clone()))
                            .route(web::get().to(get_match)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
