use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "articles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub column_id: Option<i32>,
    pub author_id: i32,
    /// Media path of the title image, relative to the media root.
    pub avatar: Option<String>,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub total_views: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::article_columns::Entity",
        from = "Column::ColumnId",
        to = "super::article_columns::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ArticleColumns,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AuthorId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::article_tags::Entity")]
    ArticleTags,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
}

impl Related<super::article_columns::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ArticleColumns.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::article_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ArticleTags.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::tags::Entity> for Entity {
    fn to() -> RelationDef {
        super::article_tags::Relation::Tags.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::article_tags::Relation::Articles.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
