use super::{internal_error, method_not_allowed, redirect};
use crate::article::{
    delete_article, get_article, get_article_for_template, get_article_page, get_columns,
    get_tags_for_article, get_tags_for_articles, increment_views, insert_article,
    resolve_column, update_article, ArticleFilter, ArticleForTemplate, ArticleListQuery,
    TagLink,
};
use crate::comment::{get_comments_for_article, CommentThread};
use crate::form::{ArticlePostForm, MultipartForm};
use crate::global::MainData;
use crate::markdown::RenderedMarkdown;
use crate::middleware::ClientCtx;
use crate::orm::articles;
use crate::template::Paginator;
use actix_multipart::Multipart;
use actix_web::{error, get, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};

pub const ARTICLE_LIST_URL: &str = "/article/article-list/";

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_article_list)
        .service(view_article_detail)
        .service(
            web::resource("/article/article-create/")
                .route(web::get().to(view_article_create))
                .route(web::post().to(create_article))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/article/article-update/{id}/")
                .route(web::get().to(view_article_update))
                .route(web::post().to(update_article_post))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/article/article-delete/{id}/")
                .route(web::post().to(delete_article_post))
                .default_service(web::to(method_not_allowed)),
        );
}

/// An article on the listing along with its tag names.
pub struct ArticleListItem {
    pub article: ArticleForTemplate,
    pub tags: Vec<TagLink>,
}

/// One entry of the column dropdown.
pub struct ColumnOption {
    pub id: i32,
    pub title: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "article/list.html")]
struct ArticleListTemplate {
    client: ClientCtx,
    articles: Vec<ArticleListItem>,
    paginator: Paginator,
    search: String,
    order: String,
    column: String,
    tag: String,
    newest_url: String,
    popular_url: String,
}

#[derive(Template)]
#[template(path = "article/detail.html")]
struct ArticleDetailTemplate {
    client: ClientCtx,
    article: ArticleForTemplate,
    tags: Vec<TagLink>,
    rendered: RenderedMarkdown,
    threads: Vec<CommentThread>,
    can_update: bool,
    can_delete: bool,
}

#[derive(Template)]
#[template(path = "article/create.html")]
struct ArticleCreateTemplate {
    client: ClientCtx,
    columns: Vec<ColumnOption>,
}

#[derive(Template)]
#[template(path = "article/update.html")]
struct ArticleUpdateTemplate {
    client: ClientCtx,
    article: ArticleForTemplate,
    tags: String,
    columns: Vec<ColumnOption>,
}

async fn get_column_options(
    data: &MainData,
    selected: Option<i32>,
) -> Result<Vec<ColumnOption>, Error> {
    Ok(get_columns(&data.pool)
        .await
        .map_err(internal_error)?
        .into_iter()
        .map(|column| ColumnOption {
            selected: selected == Some(column.id),
            id: column.id,
            title: column.title,
        })
        .collect())
}

/// Loads an article the client is allowed to change.
async fn get_article_for_author(
    client: &ClientCtx,
    data: &MainData,
    id: i32,
) -> Result<articles::Model, Error> {
    let article = get_article(&data.pool, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    if !client.can_update_article(article.author_id) {
        return Err(error::ErrorForbidden(
            "Sorry, you do not have permission to modify this article.",
        ));
    }

    Ok(article)
}

#[get("/article/article-list/")]
async fn view_article_list(
    client: ClientCtx,
    data: web::Data<MainData>,
    query: web::Query<ArticleListQuery>,
) -> Result<HttpResponse, Error> {
    let query = query.into_inner();
    let filter = ArticleFilter::from_query(&query);
    let page = get_article_page(&data.pool, &filter, query.page.as_deref())
        .await
        .map_err(internal_error)?;

    let ids = page.articles.iter().map(|a| a.id).collect();
    let mut tags = get_tags_for_articles(&data.pool, ids)
        .await
        .map_err(internal_error)?;
    let articles = page
        .articles
        .into_iter()
        .map(|article| ArticleListItem {
            tags: tags
                .remove(&article.id)
                .unwrap_or_default()
                .into_iter()
                .map(TagLink::from)
                .collect(),
            article,
        })
        .collect();

    let search = query.search.unwrap_or_default();
    let order = query.order.unwrap_or_default();
    let column = query.column.unwrap_or_default();
    let tag = query.tag.unwrap_or_default();
    let list_url = |order: &str| {
        format!(
            "{}?{}",
            ARTICLE_LIST_URL,
            url::form_urlencoded::Serializer::new(String::new())
                .append_pair("search", &search)
                .append_pair("order", order)
                .append_pair("column", &column)
                .append_pair("tag", &tag)
                .finish()
        )
    };
    let base_url = list_url(&order);
    let newest_url = list_url("normal");
    let popular_url = list_url("total_views");

    Ok(ArticleListTemplate {
        client,
        articles,
        paginator: Paginator {
            base_url,
            this_page: page.this_page,
            page_count: page.page_count,
        },
        search,
        order,
        column,
        tag,
        newest_url,
        popular_url,
    }
    .to_response())
}

#[get("/article/article-detail/{id}/")]
async fn view_article_detail(
    client: ClientCtx,
    data: web::Data<MainData>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let id = path.into_inner();
    let db = &data.pool;

    increment_views(db, id).await.map_err(internal_error)?;
    let article = get_article_for_template(db, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    let tags = get_tags_for_article(db, id)
        .await
        .map_err(internal_error)?
        .into_iter()
        .map(TagLink::from)
        .collect();
    let threads = get_comments_for_article(db, id)
        .await
        .map_err(internal_error)?;

    Ok(ArticleDetailTemplate {
        can_update: client.can_update_article(article.author_id),
        can_delete: client.can_delete_article(article.author_id),
        rendered: crate::markdown::render(&article.body),
        client,
        article,
        tags,
        threads,
    }
    .to_response())
}

async fn view_article_create(
    client: ClientCtx,
    data: web::Data<MainData>,
) -> Result<HttpResponse, Error> {
    client.require_user()?;

    Ok(ArticleCreateTemplate {
        columns: get_column_options(&data, None).await?,
        client,
    }
    .to_response())
}

async fn create_article(
    client: ClientCtx,
    data: web::Data<MainData>,
    multipart: Multipart,
) -> Result<HttpResponse, Error> {
    let author_id = client.require_user()?;
    let mut form = ArticlePostForm::from_multipart(MultipartForm::read(multipart).await?)?;

    let column_id = resolve_column(&data.pool, form.column)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error::ErrorNotFound("Column not found."))?;

    let avatar = match form.avatar.take() {
        Some(upload) => Some(data.media.save_article_avatar(upload).await?),
        None => None,
    };

    let article = insert_article(&data.pool, author_id, column_id, avatar, &form)
        .await
        .map_err(internal_error)?;
    log::info!("User {} created article {}", author_id, article.id);

    Ok(redirect(ARTICLE_LIST_URL))
}

async fn view_article_update(
    client: ClientCtx,
    data: web::Data<MainData>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    client.require_user()?;
    let id = path.into_inner();
    let article = get_article_for_author(&client, &data, id).await?;
    let columns = get_column_options(&data, article.column_id).await?;

    let article = get_article_for_template(&data.pool, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;
    let tags = get_tags_for_article(&data.pool, id)
        .await
        .map_err(internal_error)?
        .join(",");

    Ok(ArticleUpdateTemplate {
        client,
        article,
        tags,
        columns,
    }
    .to_response())
}

async fn update_article_post(
    client: ClientCtx,
    data: web::Data<MainData>,
    path: web::Path<i32>,
    multipart: Multipart,
) -> Result<HttpResponse, Error> {
    client.require_user()?;
    let article = get_article_for_author(&client, &data, path.into_inner()).await?;
    let mut form = ArticlePostForm::from_multipart(MultipartForm::read(multipart).await?)?;

    let column_id = resolve_column(&data.pool, form.column)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error::ErrorNotFound("Column not found."))?;

    let avatar = match form.avatar.take() {
        Some(upload) => Some(data.media.save_article_avatar(upload).await?),
        None => None,
    };

    let article = update_article(&data.pool, article, column_id, avatar, &form)
        .await
        .map_err(internal_error)?;

    Ok(redirect(&crate::article::get_url_for_article(article.id)))
}

async fn delete_article_post(
    client: ClientCtx,
    data: web::Data<MainData>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let user_id = client.require_user()?;
    let article = get_article(&data.pool, path.into_inner())
        .await
        .map_err(internal_error)?
        .ok_or_else(|| error::ErrorNotFound("Article not found."))?;

    if !client.can_delete_article(article.author_id) {
        return Err(error::ErrorForbidden(
            "Sorry, you do not have permission to delete this article.",
        ));
    }

    delete_article(&data.pool, article.id)
        .await
        .map_err(internal_error)?;
    log::info!("User {} deleted article {}", user_id, article.id);

    Ok(redirect(ARTICLE_LIST_URL))
}
