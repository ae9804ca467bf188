use actix_files::Files;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::middleware::Logger;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use env_logger::Env;
use rublog::db::init_db;
use rublog::middleware::ClientCtx;
use rublog::session::remove_expired_sessions;
use rublog::{Config, MainData};
use std::io::{Error, ErrorKind};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_lib_mods();

    let config =
        Config::from_env().map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;
    let pool = init_db(config.database_url.to_owned())
        .await
        .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;

    match remove_expired_sessions(&pool).await {
        Ok(count) => log::info!("Removed {} expired sessions", count),
        Err(e) => log::warn!("Could not remove expired sessions: {}", e),
    }

    std::fs::DirBuilder::new()
        .recursive(true)
        .create(&config.media_dir)?;

    let secret_key = match &config.secret_key {
        Some(key) => Key::from(key.as_slice()),
        None => {
            log::warn!("SECRET_KEY is not set; sessions will not survive a restart.");
            Key::generate()
        }
    };

    let data = Data::new(MainData::new(pool, &config));
    let media_dir = config.media_dir.to_owned();
    log::info!("Listening on {}", config.bind_address);

    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        // However, services are read top->down, higher traffic routes should be
        // placed higher
        App::new()
            .app_data(data.clone())
            .wrap(ClientCtx::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                secret_key.clone(),
            ))
            .wrap(Logger::new("%a %r %s %T"))
            .service(Files::new("/media", &media_dir))
            .configure(rublog::web::configure)
    })
    .bind(&config.bind_address)?
    .run()
    .await
}

/// Initialize third party crates we rely on but don't have control over.
pub fn init_lib_mods() {
    // A missing .env is fine, the environment may already be set.
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
