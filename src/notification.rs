use crate::orm::{articles, notifications, users};
use chrono::Utc;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, FromQueryResult, PaginatorTrait};

pub const VERB_REPLIED: &str = "replied to you";

/// Records that `actor_id` commented, once per recipient.
pub async fn notify<C: ConnectionTrait>(
    db: &C,
    actor_id: i32,
    recipients: &[i32],
    verb: &str,
    article_id: i32,
    comment_id: i32,
) -> Result<(), DbErr> {
    if recipients.is_empty() {
        return Ok(());
    }

    let now = Utc::now().naive_utc();
    notifications::Entity::insert_many(recipients.iter().map(|recipient_id| {
        notifications::ActiveModel {
            recipient_id: Set(*recipient_id),
            actor_id: Set(actor_id),
            verb: Set(verb.to_owned()),
            article_id: Set(Some(article_id)),
            comment_id: Set(Some(comment_id)),
            unread: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
    }))
    .exec(db)
    .await?;

    Ok(())
}

pub async fn unread_count<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<u64, DbErr> {
    notifications::Entity::find()
        .filter(notifications::Column::RecipientId.eq(user_id))
        .filter(notifications::Column::Unread.eq(true))
        .count(db)
        .await
}

#[derive(Clone, Debug, FromQueryResult)]
pub struct NoticeForTemplate {
    pub id: i32,
    pub verb: String,
    pub article_id: Option<i32>,
    pub created_at: chrono::NaiveDateTime,
    // join users
    pub actor_name: Option<String>,
    // join articles
    pub article_title: Option<String>,
}

impl NoticeForTemplate {
    pub fn get_url(&self) -> String {
        match self.article_id {
            Some(article_id) => format!(
                "/notice/update/?notice_id={}&article_id={}",
                self.id, article_id
            ),
            None => format!("/notice/update/?notice_id={}", self.id),
        }
    }
}

/// The user's unread notifications, newest first.
pub async fn get_unread_for_template<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Vec<NoticeForTemplate>, DbErr> {
    notifications::Entity::find()
        .select_only()
        .column(notifications::Column::Id)
        .column(notifications::Column::Verb)
        .column(notifications::Column::ArticleId)
        .column(notifications::Column::CreatedAt)
        .left_join(users::Entity)
        .column_as(users::Column::Username, "actor_name")
        .left_join(articles::Entity)
        .column_as(articles::Column::Title, "article_title")
        .filter(notifications::Column::RecipientId.eq(user_id))
        .filter(notifications::Column::Unread.eq(true))
        .order_by_desc(notifications::Column::CreatedAt)
        .order_by_desc(notifications::Column::Id)
        .into_model::<NoticeForTemplate>()
        .all(db)
        .await
}

/// Marks one of the user's notifications read. Someone else's is left alone.
pub async fn mark_read<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    notice_id: i32,
) -> Result<u64, DbErr> {
    notifications::Entity::update_many()
        .col_expr(notifications::Column::Unread, false.into())
        .filter(notifications::Column::Id.eq(notice_id))
        .filter(notifications::Column::RecipientId.eq(user_id))
        .exec(db)
        .await
        .map(|res| res.rows_affected)
}

pub async fn mark_all_read<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<u64, DbErr> {
    notifications::Entity::update_many()
        .col_expr(notifications::Column::Unread, false.into())
        .filter(notifications::Column::RecipientId.eq(user_id))
        .filter(notifications::Column::Unread.eq(true))
        .exec(db)
        .await
        .map(|res| res.rows_affected)
}
