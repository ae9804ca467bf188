mod account;
mod article;
mod comment;
mod notice;

use actix_web::http::header::{self, ContentType};
use actix_web::{error, get, Error, HttpResponse, Responder};

pub use article::ARTICLE_LIST_URL;

/// Configures the web app
///
/// @see https://docs.rs/actix-web/4.0.1/actix_web/struct.App.html#method.configure
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index);

    account::configure(conf);
    article::configure(conf);
    comment::configure(conf);
    notice::configure(conf);
}

#[get("/")]
async fn view_index() -> impl Responder {
    redirect(ARTICLE_LIST_URL)
}

/// Fallback for resources that exist but not under the requested method.
pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .content_type(ContentType::plaintext())
        .body("Method not allowed.")
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, location))
        .finish()
}

/// Logs the database error and hides it from the client.
pub fn internal_error(e: sea_orm::DbErr) -> Error {
    log::error!("database error: {}", e);
    error::ErrorInternalServerError("Something went wrong, please try again later.")
}
