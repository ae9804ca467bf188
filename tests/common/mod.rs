#![allow(dead_code)]

use actix_web::web::Data;
use image::{DynamicImage, ImageOutputFormat};
use rublog::article::insert_article;
use rublog::db::create_schema;
use rublog::filesystem::MediaStore;
use rublog::form::{ArticlePostForm, ColumnChoice};
use rublog::orm::{articles, users};
use rublog::user::{hash_password, insert_new_user};
use rublog::MainData;
use sea_orm::{ConnectOptions, Database};
use std::io::Cursor;

pub const PASSWORD: &str = "correct horse battery";
pub const BOUNDARY: &str = "rublogtestboundary";

/// Fresh in-memory database and media directory for one test.
pub async fn setup() -> Data<MainData> {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
    // Every connection to `:memory:` is its own database.
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let pool = Database::connect(opt).await.expect("sqlite connects");
    create_schema(&pool).await.expect("schema is created");

    let media = std::env::temp_dir().join(format!("rublog-test-{}", uuid::Uuid::new_v4()));

    Data::new(MainData {
        pool,
        media: MediaStore::new(media),
        session_time: chrono::Duration::minutes(30),
    })
}

/// Builds the application the way the server does, minus logging and media.
macro_rules! init_app {
    ($data:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($data.clone())
                .wrap(rublog::middleware::ClientCtx::default())
                .wrap(actix_session::SessionMiddleware::new(
                    actix_session::storage::CookieSessionStore::default(),
                    actix_web::cookie::Key::from(&[7u8; 64][..]),
                ))
                .configure(rublog::web::configure),
        )
        .await
    };
}

/// Logs in through the login form and returns the session cookie.
macro_rules! login {
    ($app:expr, $name:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/userprofile/login/")
            .set_form(&[("username", $name), ("password", $crate::common::PASSWORD)])
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FOUND);
        $crate::common::session_cookie(&resp)
    }};
}

pub fn session_cookie<B>(
    resp: &actix_web::dev::ServiceResponse<B>,
) -> actix_web::cookie::Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == "id")
        .expect("response sets the session cookie")
        .into_owned()
}

pub fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> String {
    resp.headers()
        .get(actix_web::http::header::LOCATION)
        .expect("response redirects")
        .to_str()
        .expect("location is ascii")
        .to_owned()
}

pub async fn create_user(data: &MainData, name: &str, is_superuser: bool) -> users::Model {
    let hash = hash_password(PASSWORD).expect("password hashes");
    insert_new_user(&data.pool, name, "", &hash, is_superuser)
        .await
        .expect("user is inserted")
}

pub async fn create_article(
    data: &MainData,
    author_id: i32,
    title: &str,
    body: &str,
    tags: &[&str],
    column_id: Option<i32>,
) -> articles::Model {
    let form = ArticlePostForm {
        title: title.to_owned(),
        body: body.to_owned(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        column: match column_id {
            Some(id) => ColumnChoice::Id(id),
            None => ColumnChoice::None,
        },
        avatar: None,
    };

    insert_article(&data.pool, author_id, column_id, None, &form)
        .await
        .expect("article is inserted")
}

/// A multipart field: name, optional file name, content.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn text(name: &'a str, value: &str) -> Self {
        Self {
            name,
            filename: None,
            data: value.as_bytes().to_vec(),
        }
    }

    pub fn file(name: &'a str, filename: &'a str, data: Vec<u8>) -> Self {
        Self {
            name,
            filename: Some(filename),
            data,
        }
    }
}

/// Content type header value and body for a multipart submission.
pub fn multipart(parts: &[Part]) -> (String, Vec<u8>) {
    let mut body: Vec<u8> = Vec::new();

    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .expect("png encodes");
    buf
}

pub async fn body_string<B: actix_web::body::MessageBody>(
    resp: actix_web::dev::ServiceResponse<B>,
) -> String {
    let bytes = actix_web::test::read_body(resp).await;
    String::from_utf8(bytes.to_vec()).expect("body is utf-8")
}
