use crate::orm::{profiles, users};
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::Utc;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr};

/// A mini struct for holding only what information we need about a client.
#[derive(Clone, Debug)]
pub struct ClientUser {
    pub id: i32,
    pub name: String,
    pub is_superuser: bool,
}

impl From<users::Model> for ClientUser {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            name: user.username,
            is_superuser: user.is_superuser,
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
        .to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("verify_password: stored hash is unreadable: {}", e);
            false
        }
    }
}

pub async fn insert_new_user<C: ConnectionTrait>(
    db: &C,
    name: &str,
    email: &str,
    password_hash: &str,
    is_superuser: bool,
) -> Result<users::Model, DbErr> {
    users::ActiveModel {
        username: Set(name.to_owned()),
        email: Set(email.to_owned()),
        password: Set(password_hash.to_owned()),
        is_superuser: Set(is_superuser),
        created_at: Set(Utc::now().naive_utc()),
        last_login: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn find_user_by_id<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find_by_id(id).one(db).await
}

pub async fn find_user_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find()
        .filter(users::Column::Username.eq(name))
        .one(db)
        .await
}

pub async fn touch_last_login<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<(), DbErr> {
    users::Entity::update_many()
        .col_expr(
            users::Column::LastLogin,
            sea_orm::sea_query::Expr::value(Utc::now().naive_utc()),
        )
        .filter(users::Column::Id.eq(user_id))
        .exec(db)
        .await
        .map(|_| ())
}

pub async fn get_superuser_ids<C: ConnectionTrait>(db: &C) -> Result<Vec<i32>, DbErr> {
    Ok(users::Entity::find()
        .filter(users::Column::IsSuperuser.eq(true))
        .order_by_asc(users::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|user| user.id)
        .collect())
}

/// Profiles are created on first access rather than at registration.
pub async fn get_or_create_profile<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<profiles::Model, DbErr> {
    if let Some(profile) = profiles::Entity::find()
        .filter(profiles::Column::UserId.eq(user_id))
        .one(db)
        .await?
    {
        return Ok(profile);
    }

    profiles::ActiveModel {
        user_id: Set(user_id),
        phone: Set(String::new()),
        avatar: Set(None),
        bio: Set(String::new()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn update_profile<C: ConnectionTrait>(
    db: &C,
    profile: profiles::Model,
    phone: String,
    bio: String,
    avatar: Option<String>,
) -> Result<profiles::Model, DbErr> {
    let mut active: profiles::ActiveModel = profile.into();
    active.phone = Set(phone);
    active.bio = Set(bio);
    // No upload keeps the previous picture.
    if let Some(avatar) = avatar {
        active.avatar = Set(Some(avatar));
    }
    active.update(db).await
}

pub async fn delete_user<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<u64, DbErr> {
    users::Entity::delete_by_id(user_id)
        .exec(db)
        .await
        .map(|res| res.rows_affected)
}
