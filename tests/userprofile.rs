#[macro_use]
mod common;

use actix_web::http::{header, StatusCode};
use actix_web::test;
use common::{body_string, create_article, create_user, location, multipart, png, Part};
use rublog::orm::{articles, profiles, sessions, users};
use sea_orm::{entity::*, query::*};

#[actix_rt::test]
async fn register_rejects_mismatched_passwords() {
    let data = common::setup().await;
    let app = init_app!(data);

    let req = test::TestRequest::post()
        .uri("/userprofile/register/")
        .set_form(&[
            ("username", "alice"),
            ("email", ""),
            ("password", "first"),
            ("password2", "second"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(users::Entity::find().count(&data.pool).await.unwrap(), 0);
}

#[actix_rt::test]
async fn register_creates_a_logged_in_user() {
    let data = common::setup().await;
    let app = init_app!(data);

    let req = test::TestRequest::post()
        .uri("/userprofile/register/")
        .set_form(&[
            ("username", "alice"),
            ("email", "alice@example.com"),
            ("password", "hunter22"),
            ("password2", "hunter22"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/article/article-list/");
    let cookie = common::session_cookie(&resp);

    let user = users::Entity::find().one(&data.pool).await.unwrap().unwrap();
    assert_eq!(user.username, "alice");
    assert!(user.password.starts_with("$argon2id$"));
    assert!(!user.is_superuser);
    assert!(user.last_login.is_some());
    assert_eq!(sessions::Entity::find().count(&data.pool).await.unwrap(), 1);

    // The cookie works on a login-only page.
    let req = test::TestRequest::get()
        .uri("/notice/")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    // The name is taken now.
    let req = test::TestRequest::post()
        .uri("/userprofile/register/")
        .set_form(&[
            ("username", "alice"),
            ("email", ""),
            ("password", "x"),
            ("password2", "x"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn login_checks_credentials_and_follows_next() {
    let data = common::setup().await;
    let app = init_app!(data);
    create_user(&data, "alice", false).await;

    let req = test::TestRequest::post()
        .uri("/userprofile/login/")
        .set_form(&[("username", "alice"), ("password", "wrong")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/userprofile/login/")
        .set_form(&[("username", "nobody"), ("password", common::PASSWORD)])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/userprofile/login/")
        .set_form(&[("username", ""), ("password", "")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/userprofile/login/")
        .set_form(&[
            ("username", "alice"),
            ("password", common::PASSWORD),
            ("next", "/article/article-create/"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/article/article-create/");

    // Off-site targets are ignored.
    let req = test::TestRequest::post()
        .uri("/userprofile/login/")
        .set_form(&[
            ("username", "alice"),
            ("password", common::PASSWORD),
            ("next", "//evil.example/"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/article/article-list/");
}

#[actix_rt::test]
async fn logout_removes_the_session() {
    let data = common::setup().await;
    let app = init_app!(data);
    create_user(&data, "alice", false).await;
    let cookie = login!(app, "alice");
    assert_eq!(sessions::Entity::find().count(&data.pool).await.unwrap(), 1);

    let req = test::TestRequest::get()
        .uri("/userprofile/logout/")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/article/article-list/");
    assert_eq!(sessions::Entity::find().count(&data.pool).await.unwrap(), 0);

    // The old cookie no longer signs anyone in.
    let req = test::TestRequest::get()
        .uri("/notice/")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[actix_rt::test]
async fn profile_edit_is_owner_only() {
    let data = common::setup().await;
    let app = init_app!(data);
    let alice = create_user(&data, "alice", false).await;
    create_user(&data, "mallory", false).await;
    let cookie = login!(app, "mallory");

    let (content_type, body) = multipart(&[
        Part::text("phone", "555"),
        Part::text("bio", "hacked"),
    ]);
    let req = test::TestRequest::post()
        .uri(&format!("/userprofile/edit/{}/", alice.id))
        .cookie(cookie.clone())
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let profile = profiles::Entity::find()
        .filter(profiles::Column::UserId.eq(alice.id))
        .one(&data.pool)
        .await
        .unwrap();
    assert!(profile.map_or(true, |p| p.bio.is_empty()));

    let req = test::TestRequest::get()
        .uri("/userprofile/edit/999/")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn profile_edit_updates_own_profile() {
    let data = common::setup().await;
    let app = init_app!(data);
    let alice = create_user(&data, "alice", false).await;
    let cookie = login!(app, "alice");
    let uri = format!("/userprofile/edit/{}/", alice.id);

    // First visit creates the profile.
    let req = test::TestRequest::get()
        .uri(&uri)
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(profiles::Entity::find().count(&data.pool).await.unwrap(), 1);

    let (content_type, body) = multipart(&[
        Part::text("phone", "555-0100"),
        Part::text("bio", "Writes about Rust."),
        Part::file("avatar", "me.png", png(64, 64)),
    ]);
    let req = test::TestRequest::post()
        .uri(&uri)
        .cookie(cookie.clone())
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), uri);

    let profile = profiles::Entity::find().one(&data.pool).await.unwrap().unwrap();
    assert_eq!(profile.phone, "555-0100");
    assert_eq!(profile.bio, "Writes about Rust.");
    let avatar = profile.avatar.expect("avatar is stored");
    assert!(avatar.starts_with("avatar/"));
    let stored = image::open(data.media.root().join(&avatar)).unwrap();
    assert_eq!((stored.width(), stored.height()), (64, 64));

    // No upload keeps the avatar.
    let (content_type, body) = multipart(&[Part::text("phone", ""), Part::text("bio", "")]);
    let req = test::TestRequest::post()
        .uri(&uri)
        .cookie(cookie.clone())
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    test::call_service(&app, req).await;
    let profile = profiles::Entity::find().one(&data.pool).await.unwrap().unwrap();
    assert_eq!(profile.avatar.as_deref(), Some(avatar.as_str()));

    let req = test::TestRequest::get().uri(&uri).cookie(cookie).to_request();
    let body = body_string(test::call_service(&app, req).await).await;
    assert!(body.contains(&format!("/media/{}", avatar)));
}

#[actix_rt::test]
async fn delete_user_is_self_only_and_cascades() {
    let data = common::setup().await;
    let app = init_app!(data);
    let alice = create_user(&data, "alice", false).await;
    let mallory = create_user(&data, "mallory", false).await;
    create_article(&data, alice.id, "Mine", "text", &[], None).await;

    let cookie = login!(app, "mallory");
    let req = test::TestRequest::post()
        .uri(&format!("/userprofile/delete/{}/", alice.id))
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let cookie = login!(app, "alice");
    let req = test::TestRequest::get()
        .uri(&format!("/userprofile/delete/{}/", alice.id))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

    let req = test::TestRequest::post()
        .uri(&format!("/userprofile/delete/{}/", alice.id))
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let remaining: Vec<i32> = users::Entity::find()
        .all(&data.pool)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(remaining, vec![mallory.id]);
    assert_eq!(articles::Entity::find().count(&data.pool).await.unwrap(), 0);
}
