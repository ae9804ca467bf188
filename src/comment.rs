use crate::orm::{comments, users};
use chrono::Utc;
use sea_orm::{entity::*, query::*, ConnectionTrait, DbErr, FromQueryResult};
use std::collections::HashMap;

#[derive(FromQueryResult)]
struct CommentRow {
    id: i32,
    article_id: i32,
    user_id: i32,
    body: String,
    parent_id: Option<i32>,
    reply_to_id: Option<i32>,
    created_at: chrono::NaiveDateTime,
    username: Option<String>,
}

/// A comment joined with its author and, for replies, who it answers.
#[derive(Clone, Debug)]
pub struct CommentForTemplate {
    pub id: i32,
    pub article_id: i32,
    pub user_id: i32,
    pub body: String,
    pub parent_id: Option<i32>,
    pub reply_to_id: Option<i32>,
    pub created_at: chrono::NaiveDateTime,
    pub username: Option<String>,
    pub reply_to_name: Option<String>,
}

impl CommentForTemplate {
    pub fn get_anchor(&self) -> String {
        format!("comment_elem_{}", self.id)
    }

    pub fn get_reply_url(&self) -> String {
        format!("/comment/post-comment/{}/{}/", self.article_id, self.id)
    }
}

/// A root comment and the replies hanging under it.
#[derive(Clone, Debug)]
pub struct CommentThread {
    pub root: CommentForTemplate,
    pub replies: Vec<CommentForTemplate>,
}

/// Groups chronologically sorted comments into threads.
///
/// Replies whose root is not in the list are shown as roots of their own.
pub fn build_threads(comments: Vec<CommentForTemplate>) -> Vec<CommentThread> {
    let mut threads: Vec<CommentThread> = Vec::new();
    let mut index: HashMap<i32, usize> = HashMap::new();
    let mut orphans: Vec<CommentForTemplate> = Vec::new();

    for comment in comments {
        match comment.parent_id {
            None => {
                index.insert(comment.id, threads.len());
                threads.push(CommentThread {
                    root: comment,
                    replies: Vec::new(),
                });
            }
            Some(parent_id) => match index.get(&parent_id) {
                Some(i) => threads[*i].replies.push(comment),
                None => orphans.push(comment),
            },
        }
    }

    for orphan in orphans {
        match orphan.parent_id.and_then(|p| index.get(&p)) {
            Some(i) => threads[*i].replies.push(orphan),
            None => threads.push(CommentThread {
                root: orphan,
                replies: Vec::new(),
            }),
        }
    }

    threads
}

/// All comments on an article in posting order, threaded.
pub async fn get_comments_for_article<C: ConnectionTrait>(
    db: &C,
    article_id: i32,
) -> Result<Vec<CommentThread>, DbErr> {
    let rows = comments::Entity::find()
        .filter(comments::Column::ArticleId.eq(article_id))
        .left_join(users::Entity)
        .column_as(users::Column::Username, "username")
        .order_by_asc(comments::Column::CreatedAt)
        .order_by_asc(comments::Column::Id)
        .into_model::<CommentRow>()
        .all(db)
        .await?;

    let mut reply_to_ids: Vec<i32> = rows.iter().filter_map(|c| c.reply_to_id).collect();
    reply_to_ids.sort_unstable();
    reply_to_ids.dedup();

    let names: HashMap<i32, String> = if reply_to_ids.is_empty() {
        HashMap::new()
    } else {
        users::Entity::find()
            .filter(users::Column::Id.is_in(reply_to_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect()
    };

    let comments = rows
        .into_iter()
        .map(|row| CommentForTemplate {
            reply_to_name: row.reply_to_id.and_then(|id| names.get(&id).cloned()),
            id: row.id,
            article_id: row.article_id,
            user_id: row.user_id,
            body: row.body,
            parent_id: row.parent_id,
            reply_to_id: row.reply_to_id,
            created_at: row.created_at,
            username: row.username,
        })
        .collect();

    Ok(build_threads(comments))
}

pub async fn get_comment<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<Option<comments::Model>, DbErr> {
    comments::Entity::find_by_id(id).one(db).await
}

/// Walks up from a comment to the top of its thread.
pub async fn find_root<C: ConnectionTrait>(
    db: &C,
    comment: comments::Model,
) -> Result<comments::Model, DbErr> {
    let mut current = comment;
    while let Some(parent_id) = current.parent_id {
        match get_comment(db, parent_id).await? {
            Some(parent) => current = parent,
            None => break,
        }
    }
    Ok(current)
}

pub async fn insert_comment<C: ConnectionTrait>(
    db: &C,
    article_id: i32,
    user_id: i32,
    body: String,
    parent_id: Option<i32>,
    reply_to_id: Option<i32>,
) -> Result<comments::Model, DbErr> {
    comments::ActiveModel {
        article_id: Set(article_id),
        user_id: Set(user_id),
        body: Set(body),
        parent_id: Set(parent_id),
        reply_to_id: Set(reply_to_id),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: i32, parent_id: Option<i32>) -> CommentForTemplate {
        CommentForTemplate {
            id,
            article_id: 1,
            user_id: 1,
            body: format!("comment {}", id),
            parent_id,
            reply_to_id: None,
            created_at: Utc::now().naive_utc(),
            username: Some("someone".to_owned()),
            reply_to_name: None,
        }
    }

    #[test]
    fn threads_group_replies_under_roots() {
        let threads = build_threads(vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, None),
            comment(4, Some(1)),
            comment(5, Some(3)),
        ]);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].root.id, 1);
        assert_eq!(
            threads[0].replies.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![2, 4]
        );
        assert_eq!(threads[1].root.id, 3);
        assert_eq!(threads[1].replies[0].id, 5);
    }

    #[test]
    fn threads_keep_replies_without_root() {
        let threads = build_threads(vec![comment(7, Some(99)), comment(8, None)]);
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].root.id, 8);
        assert_eq!(threads[1].root.id, 7);
    }

    #[test]
    fn anchors_and_reply_urls() {
        let c = comment(12, None);
        assert_eq!(c.get_anchor(), "comment_elem_12");
        assert_eq!(c.get_reply_url(), "/comment/post-comment/1/12/");
    }
}
