use crate::orm::{sessions, users};
use crate::user::ClientUser;
use actix_session::Session;
use chrono::Utc;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};
use uuid::Uuid;

/// Cookie key holding the session id.
pub const SESSION_TOKEN: &str = "token";

/// Inserts a session row for the user and returns its id.
pub async fn new_session<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    session_time: chrono::Duration,
) -> Result<Uuid, DbErr> {
    let uuid = Uuid::new_v4();
    let now = Utc::now().naive_utc();

    sessions::ActiveModel {
        id: Set(uuid.to_string()),
        user_id: Set(user_id),
        created_at: Set(now),
        expires_at: Set(now + session_time),
    }
    .insert(db)
    .await?;

    Ok(uuid)
}

pub async fn remove_session<C: ConnectionTrait>(db: &C, uuid: Uuid) -> Result<u64, DbErr> {
    sessions::Entity::delete_by_id(uuid.to_string())
        .exec(db)
        .await
        .map(|res| res.rows_affected)
}

/// Drops every expired session row.
pub async fn remove_expired_sessions<C: ConnectionTrait>(db: &C) -> Result<u64, DbErr> {
    sessions::Entity::delete_many()
        .filter(sessions::Column::ExpiresAt.lte(Utc::now().naive_utc()))
        .exec(db)
        .await
        .map(|res| res.rows_affected)
}

/// Reads the session id out of the cookie, if there is a well formed one.
pub fn get_session_token(cookies: &Session) -> Option<Uuid> {
    match cookies.get::<String>(SESSION_TOKEN) {
        Ok(Some(token)) => Uuid::parse_str(&token)
            .map_err(|e| log::debug!("get_session_token: parse_str() {}", e))
            .ok(),
        Ok(None) => None,
        Err(e) => {
            log::error!("get_session_token: cookies.get() {}", e);
            None
        }
    }
}

/// Resolves the cookie to a signed-in user through an unexpired session row.
pub async fn authenticate_client_by_session<C: ConnectionTrait>(
    db: &C,
    cookies: &Session,
) -> Option<ClientUser> {
    let uuid = get_session_token(cookies)?;

    match sessions::Entity::find_by_id(uuid.to_string())
        .filter(sessions::Column::ExpiresAt.gt(Utc::now().naive_utc()))
        .find_also_related(users::Entity)
        .one(db)
        .await
    {
        Ok(Some((_, Some(user)))) => Some(user.into()),
        Ok(_) => None,
        Err(e) => {
            log::error!("authenticate_client_by_session: {}", e);
            None
        }
    }
}

/// Starts a fresh session for the user and hands its id to the cookie.
pub async fn login<C: ConnectionTrait>(
    db: &C,
    cookies: &Session,
    user_id: i32,
    session_time: chrono::Duration,
) -> Result<(), actix_web::Error> {
    // Never reuse an id from before authentication.
    forget_session(db, cookies).await;
    cookies.renew();

    let uuid = new_session(db, user_id, session_time).await.map_err(|e| {
        log::error!("login: new_session() {}", e);
        actix_web::error::ErrorInternalServerError("Could not start a session.")
    })?;

    cookies.insert(SESSION_TOKEN, uuid.to_string()).map_err(|e| {
        log::error!("login: cookies.insert() {}", e);
        actix_web::error::ErrorInternalServerError("Could not start a session.")
    })?;

    crate::user::touch_last_login(db, user_id)
        .await
        .unwrap_or_else(|e| log::warn!("login: touch_last_login() {}", e));

    Ok(())
}

/// Removes the session row (if any) and empties the cookie. Never fails.
pub async fn logout<C: ConnectionTrait>(db: &C, cookies: &Session) {
    forget_session(db, cookies).await;
    cookies.purge();
}

async fn forget_session<C: ConnectionTrait>(db: &C, cookies: &Session) {
    if let Some(uuid) = get_session_token(cookies) {
        if let Err(e) = remove_session(db, uuid).await {
            log::error!("forget_session: remove_session() {}", e);
        }
    }
}
