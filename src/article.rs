use crate::form::{ArticlePostForm, ColumnChoice};
use crate::orm::{article_columns, article_tags, articles, tags, users};
use chrono::Utc;
use sea_orm::sea_query::{BinOper, Expr, Func, Query, SimpleExpr};
use sea_orm::{
    entity::*, query::*, ConnectionTrait, DbErr, FromQueryResult, PaginatorTrait,
    TransactionTrait,
};
use serde::Deserialize;
use std::collections::HashMap;

pub const ARTICLES_PER_PAGE: u64 = 3;

/// Raw list query string. Every field is optional and echoed back to the page.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ArticleListQuery {
    pub search: Option<String>,
    pub order: Option<String>,
    pub column: Option<String>,
    pub tag: Option<String>,
    pub page: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArticleOrder {
    Newest,
    TotalViews,
}

/// Filters actually applied to a listing, after discarding unusable input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArticleFilter {
    pub search: Option<String>,
    pub column: Option<i64>,
    pub tag: Option<String>,
    pub order: ArticleOrder,
}

impl ArticleFilter {
    pub fn from_query(query: &ArticleListQuery) -> Self {
        Self {
            search: query.search.to_owned().filter(|s| !s.is_empty()),
            // Only all-digit column ids narrow the listing. Ids past i64
            // cannot exist, so they saturate and match nothing.
            column: query
                .column
                .as_deref()
                .filter(|c| !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()))
                .map(|c| c.parse::<i64>().unwrap_or(i64::MAX)),
            tag: query
                .tag
                .to_owned()
                .filter(|t| !t.is_empty() && t != "None"),
            order: match query.order.as_deref() {
                Some("total_views") => ArticleOrder::TotalViews,
                _ => ArticleOrder::Newest,
            },
        }
    }

    /// Builds the narrowed, ordered selection. Joins are added by the caller.
    pub fn apply(&self, mut select: Select<articles::Entity>) -> Select<articles::Entity> {
        if let Some(search) = &self.search {
            // Both sides go through the backend's LOWER() so they fold alike.
            let pattern = format!("%{}%", escape_like(search));
            let matches = |column: articles::Column| {
                Expr::expr(Func::lower(Expr::col((articles::Entity, column)))).binary(
                    BinOper::Like,
                    SimpleExpr::Binary(
                        Box::new(Func::lower(Expr::val(pattern.as_str())).into()),
                        BinOper::Escape,
                        Box::new(SimpleExpr::Constant('\\'.into())),
                    ),
                )
            };
            select = select.filter(
                Condition::any()
                    .add(matches(articles::Column::Title))
                    .add(matches(articles::Column::Body)),
            );
        }

        if let Some(column) = self.column {
            select = select.filter(articles::Column::ColumnId.eq(column));
        }

        if let Some(tag) = &self.tag {
            select = select.filter(
                articles::Column::Id.in_subquery(
                    Query::select()
                        .column((article_tags::Entity, article_tags::Column::ArticleId))
                        .from(article_tags::Entity)
                        .inner_join(
                            tags::Entity,
                            Expr::col((tags::Entity, tags::Column::Id))
                                .equals((article_tags::Entity, article_tags::Column::TagId)),
                        )
                        .and_where(Expr::col((tags::Entity, tags::Column::Name)).eq(tag.as_str()))
                        .to_owned(),
                ),
            );
        }

        match self.order {
            ArticleOrder::TotalViews => select
                .order_by_desc(articles::Column::TotalViews)
                .order_by_desc(articles::Column::CreatedAt)
                .order_by_desc(articles::Column::Id),
            ArticleOrder::Newest => select
                .order_by_desc(articles::Column::CreatedAt)
                .order_by_desc(articles::Column::Id),
        }
    }
}

/// Escapes LIKE wildcards so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A fully joined struct representing the article model and its relational data.
#[derive(Clone, Debug, FromQueryResult)]
pub struct ArticleForTemplate {
    pub id: i32,
    pub column_id: Option<i32>,
    pub author_id: i32,
    pub avatar: Option<String>,
    pub title: String,
    pub body: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    pub total_views: i32,
    // join users
    pub username: Option<String>,
    // join article_columns
    pub column_title: Option<String>,
}

impl ArticleForTemplate {
    pub fn get_url(&self) -> String {
        get_url_for_article(self.id)
    }

    pub fn get_avatar_url(&self) -> Option<String> {
        self.avatar
            .as_deref()
            .map(crate::filesystem::get_file_url_by_filename)
    }

    /// Leading slice of the body for listings.
    pub fn get_excerpt(&self) -> String {
        const EXCERPT_CHARS: usize = 100;
        let mut excerpt: String = self.body.chars().take(EXCERPT_CHARS).collect();
        if self.body.chars().nth(EXCERPT_CHARS).is_some() {
            excerpt.push_str("...");
        }
        excerpt
    }
}

pub fn get_url_for_article(id: i32) -> String {
    format!("/article/article-detail/{}/", id)
}

/// A tag name and the listing narrowed to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagLink {
    pub name: String,
    pub url: String,
}

impl From<String> for TagLink {
    fn from(name: String) -> Self {
        Self {
            url: format!(
                "/article/article-list/?{}",
                url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("tag", &name)
                    .finish()
            ),
            name,
        }
    }
}

fn select_for_template(select: Select<articles::Entity>) -> Select<articles::Entity> {
    select
        .left_join(users::Entity)
        .column_as(users::Column::Username, "username")
        .left_join(article_columns::Entity)
        .column_as(article_columns::Column::Title, "column_title")
}

/// One page of a listing plus what the paginator needs to know.
#[derive(Debug)]
pub struct ArticlePage {
    pub articles: Vec<ArticleForTemplate>,
    pub this_page: u64,
    pub page_count: u64,
    pub item_count: u64,
}

/// Runs a filtered listing. `page` is raw user input.
pub async fn get_article_page<C: ConnectionTrait>(
    db: &C,
    filter: &ArticleFilter,
    page: Option<&str>,
) -> Result<ArticlePage, DbErr> {
    let paginator = select_for_template(filter.apply(articles::Entity::find()))
        .into_model::<ArticleForTemplate>()
        .paginate(db, ARTICLES_PER_PAGE);

    let counts = paginator.num_items_and_pages().await?;
    let page_count = counts.number_of_pages.max(1);
    let this_page = crate::template::resolve_page(page, page_count);
    let articles = paginator.fetch_page(this_page - 1).await?;

    Ok(ArticlePage {
        articles,
        this_page,
        page_count,
        item_count: counts.number_of_items,
    })
}

pub async fn get_article<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<Option<articles::Model>, DbErr> {
    articles::Entity::find_by_id(id).one(db).await
}

pub async fn get_article_for_template<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<Option<ArticleForTemplate>, DbErr> {
    select_for_template(articles::Entity::find_by_id(id))
        .into_model::<ArticleForTemplate>()
        .one(db)
        .await
}

/// Adds one view. Only the counter column is written.
pub async fn increment_views<C: ConnectionTrait>(db: &C, id: i32) -> Result<(), DbErr> {
    articles::Entity::update_many()
        .col_expr(
            articles::Column::TotalViews,
            Expr::col(articles::Column::TotalViews).add(1),
        )
        .filter(articles::Column::Id.eq(id))
        .exec(db)
        .await
        .map(|_| ())
}

pub async fn get_columns<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<article_columns::Model>, DbErr> {
    article_columns::Entity::find()
        .order_by_asc(article_columns::Column::Id)
        .all(db)
        .await
}

pub async fn insert_column<C: ConnectionTrait>(
    db: &C,
    title: &str,
) -> Result<article_columns::Model, DbErr> {
    article_columns::ActiveModel {
        title: Set(title.to_owned()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Checks the submitted column exists. `Ok(None)` is a missing column.
pub async fn resolve_column<C: ConnectionTrait>(
    db: &C,
    choice: ColumnChoice,
) -> Result<Option<Option<i32>>, DbErr> {
    match choice {
        ColumnChoice::None => Ok(Some(None)),
        ColumnChoice::Id(id) => Ok(article_columns::Entity::find_by_id(id)
            .one(db)
            .await?
            .map(|column| Some(column.id))),
    }
}

/// Tag names per article id, alphabetical.
pub async fn get_tags_for_articles<C: ConnectionTrait>(
    db: &C,
    ids: Vec<i32>,
) -> Result<HashMap<i32, Vec<String>>, DbErr> {
    #[derive(FromQueryResult)]
    struct ArticleTagName {
        article_id: i32,
        name: String,
    }

    let mut result: HashMap<i32, Vec<String>> = HashMap::new();
    if ids.is_empty() {
        return Ok(result);
    }

    let names = article_tags::Entity::find()
        .select_only()
        .column(article_tags::Column::ArticleId)
        .left_join(tags::Entity)
        .column_as(tags::Column::Name, "name")
        .filter(article_tags::Column::ArticleId.is_in(ids))
        .order_by_asc(tags::Column::Name)
        .into_model::<ArticleTagName>()
        .all(db)
        .await?;

    for tag in names {
        result.entry(tag.article_id).or_default().push(tag.name);
    }

    Ok(result)
}

pub async fn get_tags_for_article<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<Vec<String>, DbErr> {
    Ok(get_tags_for_articles(db, vec![id])
        .await?
        .remove(&id)
        .unwrap_or_default())
}

/// Replaces the article's tags wholesale, creating unknown tags on the way.
pub async fn set_tags<C: ConnectionTrait>(
    db: &C,
    article_id: i32,
    names: &[String],
) -> Result<(), DbErr> {
    article_tags::Entity::delete_many()
        .filter(article_tags::Column::ArticleId.eq(article_id))
        .exec(db)
        .await?;

    for name in names {
        let tag = match tags::Entity::find()
            .filter(tags::Column::Name.eq(name.as_str()))
            .one(db)
            .await?
        {
            Some(tag) => tag,
            None => {
                tags::ActiveModel {
                    name: Set(name.to_owned()),
                    slug: Set(slug::slugify(name)),
                    ..Default::default()
                }
                .insert(db)
                .await?
            }
        };

        article_tags::ActiveModel {
            article_id: Set(article_id),
            tag_id: Set(tag.id),
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

/// Inserts the article and its tag links in one transaction.
pub async fn insert_article<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    author_id: i32,
    column_id: Option<i32>,
    avatar: Option<String>,
    form: &ArticlePostForm,
) -> Result<articles::Model, DbErr> {
    let now = Utc::now().naive_utc();
    let txn = db.begin().await?;

    let article = articles::ActiveModel {
        column_id: Set(column_id),
        author_id: Set(author_id),
        avatar: Set(avatar),
        title: Set(form.title.to_owned()),
        body: Set(form.body.to_owned()),
        created_at: Set(now),
        updated_at: Set(now),
        total_views: Set(0),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    set_tags(&txn, article.id, &form.tags).await?;
    txn.commit().await?;

    Ok(article)
}

/// Overwrites the editable fields, then the tags. Not atomic as a whole.
pub async fn update_article<C: ConnectionTrait>(
    db: &C,
    article: articles::Model,
    column_id: Option<i32>,
    avatar: Option<String>,
    form: &ArticlePostForm,
) -> Result<articles::Model, DbErr> {
    let mut active: articles::ActiveModel = article.into();
    active.title = Set(form.title.to_owned());
    active.body = Set(form.body.to_owned());
    active.column_id = Set(column_id);
    if let Some(avatar) = avatar {
        active.avatar = Set(Some(avatar));
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let article = active.update(db).await?;
    set_tags(db, article.id, &form.tags).await?;

    Ok(article)
}

pub async fn delete_article<C: ConnectionTrait>(db: &C, id: i32) -> Result<u64, DbErr> {
    articles::Entity::delete_by_id(id)
        .exec(db)
        .await
        .map(|res| res.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(search: &str, order: &str, column: &str, tag: &str) -> ArticleListQuery {
        ArticleListQuery {
            search: Some(search.to_owned()),
            order: Some(order.to_owned()),
            column: Some(column.to_owned()),
            tag: Some(tag.to_owned()),
            page: None,
        }
    }

    #[test]
    fn filter_discards_unusable_input() {
        let filter = ArticleFilter::from_query(&query("", "", "abc", "None"));
        assert_eq!(filter.search, None);
        assert_eq!(filter.column, None);
        assert_eq!(filter.tag, None);
        assert_eq!(filter.order, ArticleOrder::Newest);

        let filter = ArticleFilter::from_query(&query("-1", "created", "-1", ""));
        assert_eq!(filter.search.as_deref(), Some("-1"));
        assert_eq!(filter.column, None);
        assert_eq!(filter.tag, None);
    }

    #[test]
    fn filter_keeps_usable_input() {
        let filter = ArticleFilter::from_query(&query("Rust", "total_views", "7", "web"));
        assert_eq!(filter.search.as_deref(), Some("Rust"));
        assert_eq!(filter.column, Some(7));
        assert_eq!(filter.tag.as_deref(), Some("web"));
        assert_eq!(filter.order, ArticleOrder::TotalViews);

        assert_eq!(
            ArticleFilter::from_query(&ArticleListQuery::default()).order,
            ArticleOrder::Newest
        );
    }

    #[test]
    fn oversized_column_id_still_filters() {
        let filter = ArticleFilter::from_query(&query("", "", "99999999999", ""));
        assert_eq!(filter.column, Some(99999999999));

        let filter = ArticleFilter::from_query(&query("", "", "99999999999999999999999", ""));
        assert_eq!(filter.column, Some(i64::MAX));
    }

    #[test]
    fn tag_links_are_url_encoded() {
        let link = TagLink::from("c++ & rust".to_owned());
        assert_eq!(link.name, "c++ & rust");
        assert_eq!(link.url, "/article/article-list/?tag=c%2B%2B+%26+rust");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
