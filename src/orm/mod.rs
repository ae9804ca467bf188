pub mod article_columns;
pub mod article_tags;
pub mod articles;
pub mod comments;
pub mod notifications;
pub mod profiles;
pub mod sessions;
pub mod tags;
pub mod users;
