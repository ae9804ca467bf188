use super::{internal_error, method_not_allowed, redirect};
use crate::article::get_article;
use crate::comment::{find_root, get_comment, insert_comment};
use crate::form::{validate_comment_form, CommentFormData};
use crate::global::MainData;
use crate::middleware::ClientCtx;
use crate::notification::{notify, VERB_REPLIED};
use crate::orm::articles;
use actix_web::{error, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use serde_json::json;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(
        web::resource("/comment/post-comment/{article_id}/")
            .route(web::get().to(view_comment_form))
            .route(web::post().to(post_comment))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/comment/post-comment/{article_id}/{parent_comment_id}/")
            .route(web::get().to(view_reply_form))
            .route(web::post().to(post_reply))
            .default_service(web::to(method_not_allowed)),
    );
}

#[derive(Template)]
#[template(path = "comment/reply.html")]
struct CommentReplyTemplate {
    client: ClientCtx,
    article_id: i32,
    parent_comment_id: Option<i32>,
}

async fn get_article_or_404(data: &MainData, id: i32) -> Result<articles::Model, Error> {
    get_article(&data.pool, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))
}

async fn view_comment_form(
    client: ClientCtx,
    data: web::Data<MainData>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    client.require_user()?;
    let article = get_article_or_404(&data, path.into_inner()).await?;

    Ok(CommentReplyTemplate {
        client,
        article_id: article.id,
        parent_comment_id: None,
    }
    .to_response())
}

async fn view_reply_form(
    client: ClientCtx,
    data: web::Data<MainData>,
    path: web::Path<(i32, i32)>,
) -> Result<HttpResponse, Error> {
    client.require_user()?;
    let (article_id, parent_comment_id) = path.into_inner();
    let article = get_article_or_404(&data, article_id).await?;

    Ok(CommentReplyTemplate {
        client,
        article_id: article.id,
        parent_comment_id: Some(parent_comment_id),
    }
    .to_response())
}

/// The form is extracted leniently so the login check runs before any
/// complaint about the body.
fn read_comment_form(
    form: Result<web::Form<CommentFormData>, Error>,
) -> Result<CommentFormData, Error> {
    form.map(web::Form::into_inner).map_err(|e| {
        log::debug!("read_comment_form: {}", e);
        error::ErrorBadRequest("The comment form could not be read.")
    })
}

/// Root comment. Site superusers hear about it unless one of them wrote it.
async fn post_comment(
    client: ClientCtx,
    data: web::Data<MainData>,
    path: web::Path<i32>,
    form: Result<web::Form<CommentFormData>, Error>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_user()?;
    let article = get_article_or_404(&data, path.into_inner()).await?;
    let body = validate_comment_form(read_comment_form(form)?)?;

    let comment = insert_comment(&data.pool, article.id, user_id, body, None, None)
        .await
        .map_err(internal_error)?;

    if !client.is_superuser() {
        let superusers = crate::user::get_superuser_ids(&data.pool)
            .await
            .map_err(internal_error)?;
        notify(
            &data.pool,
            user_id,
            &superusers,
            VERB_REPLIED,
            article.id,
            comment.id,
        )
        .await
        .map_err(internal_error)?;
    }

    Ok(redirect(&format!(
        "{}#comment_elem_{}",
        crate::article::get_url_for_article(article.id),
        comment.id
    )))
}

/// Reply to an existing comment. Threads are kept two levels deep, so the
/// reply always hangs off the thread's root.
async fn post_reply(
    client: ClientCtx,
    data: web::Data<MainData>,
    path: web::Path<(i32, i32)>,
    form: Result<web::Form<CommentFormData>, Error>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_user()?;
    let (article_id, parent_comment_id) = path.into_inner();
    let article = get_article_or_404(&data, article_id).await?;
    let body = validate_comment_form(read_comment_form(form)?)?;

    let parent = get_comment(&data.pool, parent_comment_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error::ErrorNotFound("The comment being replied to does not exist."))?;
    if parent.article_id != article.id {
        return Err(error::ErrorBadRequest(
            "The comment being replied to belongs to another article.",
        ));
    }

    let reply_to_id = parent.user_id;
    let root = find_root(&data.pool, parent)
        .await
        .map_err(internal_error)?;

    let comment = insert_comment(
        &data.pool,
        article.id,
        user_id,
        body,
        Some(root.id),
        Some(reply_to_id),
    )
    .await
    .map_err(internal_error)?;

    notify(
        &data.pool,
        user_id,
        &[reply_to_id],
        VERB_REPLIED,
        article.id,
        comment.id,
    )
    .await
    .map_err(internal_error)?;

    Ok(HttpResponse::Ok().json(json!({
        "code": "200 OK",
        "new_comment_id": comment.id,
    })))
}
