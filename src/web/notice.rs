use super::{internal_error, redirect};
use crate::global::MainData;
use crate::middleware::ClientCtx;
use crate::notification::{get_unread_for_template, mark_all_read, mark_read, NoticeForTemplate};
use actix_web::{get, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use serde::Deserialize;

const NOTICE_LIST_URL: &str = "/notice/";

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_notices).service(view_notice_update);
}

#[derive(Template)]
#[template(path = "notice/list.html")]
struct NoticeListTemplate {
    client: ClientCtx,
    notices: Vec<NoticeForTemplate>,
}

#[derive(Deserialize)]
struct NoticeUpdateQuery {
    notice_id: Option<String>,
    article_id: Option<String>,
}

#[get("/notice/")]
async fn view_notices(client: ClientCtx, data: web::Data<MainData>) -> Result<HttpResponse, Error> {
    let user_id = client.require_user()?;
    let notices = get_unread_for_template(&data.pool, user_id)
        .await
        .map_err(internal_error)?;

    Ok(NoticeListTemplate { client, notices }.to_response())
}

/// Marks one notice read and opens its article, or marks every notice read.
#[get("/notice/update/")]
async fn view_notice_update(
    client: ClientCtx,
    data: web::Data<MainData>,
    query: web::Query<NoticeUpdateQuery>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_user()?;
    let notice_id = query
        .notice_id
        .as_deref()
        .and_then(|id| id.trim().parse::<i32>().ok());

    match notice_id {
        Some(notice_id) => {
            mark_read(&data.pool, user_id, notice_id)
                .await
                .map_err(internal_error)?;

            match query
                .article_id
                .as_deref()
                .and_then(|id| id.trim().parse::<i32>().ok())
            {
                Some(article_id) => Ok(redirect(&crate::article::get_url_for_article(
                    article_id,
                ))),
                None => Ok(redirect(NOTICE_LIST_URL)),
            }
        }
        None => {
            mark_all_read(&data.pool, user_id)
                .await
                .map_err(internal_error)?;
            Ok(redirect(NOTICE_LIST_URL))
        }
    }
}
