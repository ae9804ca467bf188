use super::{internal_error, method_not_allowed, redirect, ARTICLE_LIST_URL};
use crate::form::{
    safe_next, validate_login_form, validate_register_form, LoginFormData, MultipartForm,
    ProfileForm, RegisterFormData,
};
use crate::global::MainData;
use crate::middleware::ClientCtx;
use crate::orm::{profiles, users};
use crate::session::{login, logout};
use crate::user::{
    delete_user, find_user_by_id, find_user_by_name, get_or_create_profile, hash_password,
    insert_new_user, update_profile, verify_password,
};
use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{error, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(
        web::resource("/userprofile/login/")
            .route(web::get().to(view_login))
            .route(web::post().to(post_login))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/userprofile/logout/")
            .route(web::get().to(view_logout))
            .route(web::post().to(view_logout))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/userprofile/register/")
            .route(web::get().to(view_register))
            .route(web::post().to(post_register))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/userprofile/delete/{id}/")
            .route(web::post().to(post_delete_user))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/userprofile/edit/{id}/")
            .route(web::get().to(view_profile_edit))
            .route(web::post().to(post_profile_edit))
            .default_service(web::to(method_not_allowed)),
    );
}

#[derive(Template)]
#[template(path = "userprofile/login.html")]
struct LoginTemplate {
    client: ClientCtx,
    next: String,
}

#[derive(Template)]
#[template(path = "userprofile/register.html")]
struct RegisterTemplate {
    client: ClientCtx,
}

#[derive(Template)]
#[template(path = "userprofile/edit.html")]
struct ProfileEditTemplate {
    client: ClientCtx,
    user: users::Model,
    profile: profiles::Model,
    avatar_url: Option<String>,
    can_edit: bool,
}

#[derive(Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

fn get_user_edit_url(id: i32) -> String {
    format!("/userprofile/edit/{}/", id)
}

async fn get_user_or_404(data: &MainData, id: i32) -> Result<users::Model, Error> {
    find_user_by_id(&data.pool, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error::ErrorNotFound("User not found."))
}

async fn view_login(client: ClientCtx, query: web::Query<LoginQuery>) -> HttpResponse {
    LoginTemplate {
        client,
        next: safe_next(query.next.as_deref()).unwrap_or_default().to_owned(),
    }
    .to_response()
}

async fn post_login(
    data: web::Data<MainData>,
    cookies: Session,
    form: web::Form<LoginFormData>,
) -> Result<HttpResponse, Error> {
    let form = validate_login_form(form.into_inner())?;

    let user = match find_user_by_name(&data.pool, &form.username)
        .await
        .map_err(internal_error)?
    {
        Some(user) => {
            // argon2 runs on the blocking pool.
            let password = form.password.to_owned();
            let hash = user.password.to_owned();
            let verified = web::block(move || verify_password(&password, &hash))
                .await
                .map_err(|e| {
                    log::error!("post_login: web::block() {}", e);
                    error::ErrorInternalServerError("Could not check the password.")
                })?;
            verified.then_some(user)
        }
        None => None,
    };

    let user = user.ok_or_else(|| {
        log::debug!("post_login: failed login for {}", form.username);
        error::ErrorUnauthorized("Incorrect username or password, please try again.")
    })?;

    login(&data.pool, &cookies, user.id, data.session_time).await?;
    log::info!("User {} logged in", user.id);

    Ok(redirect(
        safe_next(form.next.as_deref()).unwrap_or(ARTICLE_LIST_URL),
    ))
}

async fn view_logout(data: web::Data<MainData>, cookies: Session) -> HttpResponse {
    logout(&data.pool, &cookies).await;
    redirect(ARTICLE_LIST_URL)
}

async fn view_register(client: ClientCtx) -> HttpResponse {
    RegisterTemplate { client }.to_response()
}

async fn post_register(
    data: web::Data<MainData>,
    cookies: Session,
    form: web::Form<RegisterFormData>,
) -> Result<HttpResponse, Error> {
    let form = validate_register_form(form.into_inner())?;

    if find_user_by_name(&data.pool, &form.username)
        .await
        .map_err(internal_error)?
        .is_some()
    {
        return Err(error::ErrorBadRequest(
            "A user with that username already exists.",
        ));
    }

    let password = form.password.to_owned();
    let password_hash = web::block(move || hash_password(&password))
        .await
        .map_err(|e| {
            log::error!("post_register: web::block() {}", e);
            error::ErrorInternalServerError("Could not create the account.")
        })?
        .map_err(|e| {
            log::error!("post_register: hash_password() {}", e);
            error::ErrorInternalServerError("Could not create the account.")
        })?;

    let user = insert_new_user(&data.pool, &form.username, &form.email, &password_hash, false)
        .await
        .map_err(internal_error)?;
    log::info!("User {} registered as {}", user.id, user.username);

    login(&data.pool, &cookies, user.id, data.session_time).await?;

    Ok(redirect(ARTICLE_LIST_URL))
}

async fn post_delete_user(
    client: ClientCtx,
    data: web::Data<MainData>,
    cookies: Session,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    client.require_user()?;
    let user = get_user_or_404(&data, path.into_inner()).await?;

    if !client.can_edit_user(user.id) {
        return Err(error::ErrorForbidden(
            "You do not have permission to delete this user.",
        ));
    }

    logout(&data.pool, &cookies).await;
    delete_user(&data.pool, user.id)
        .await
        .map_err(internal_error)?;
    log::info!("User {} deleted their account", user.id);

    Ok(redirect(ARTICLE_LIST_URL))
}

async fn view_profile_edit(
    client: ClientCtx,
    data: web::Data<MainData>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    client.require_user()?;
    let user = get_user_or_404(&data, path.into_inner()).await?;
    let profile = get_or_create_profile(&data.pool, user.id)
        .await
        .map_err(internal_error)?;

    Ok(ProfileEditTemplate {
        can_edit: client.can_edit_user(user.id),
        avatar_url: profile
            .avatar
            .as_deref()
            .map(crate::filesystem::get_file_url_by_filename),
        client,
        user,
        profile,
    }
    .to_response())
}

async fn post_profile_edit(
    client: ClientCtx,
    data: web::Data<MainData>,
    path: web::Path<i32>,
    multipart: Multipart,
) -> Result<HttpResponse, Error> {
    client.require_user()?;
    let user = get_user_or_404(&data, path.into_inner()).await?;

    if !client.can_edit_user(user.id) {
        return Err(error::ErrorForbidden(
            "You do not have permission to modify this user's information.",
        ));
    }

    let profile = get_or_create_profile(&data.pool, user.id)
        .await
        .map_err(internal_error)?;
    let mut form = ProfileForm::from_multipart(MultipartForm::read(multipart).await?)?;

    let avatar = match form.avatar.take() {
        Some(upload) => Some(data.media.save_user_avatar(upload).await?),
        None => None,
    };

    update_profile(&data.pool, profile, form.phone, form.bio, avatar)
        .await
        .map_err(internal_error)?;

    Ok(redirect(&get_user_edit_url(user.id)))
}
