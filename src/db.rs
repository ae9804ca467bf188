use crate::orm::{
    article_columns, article_tags, articles, comments, notifications, profiles, sessions, tags,
    users,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;

/// Opens the database URL and makes sure every table exists.
pub async fn init_db(database_url: String) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    create_schema(&db).await?;

    Ok(db)
}

/// Creates any missing table from the entity definitions.
/// Order matters on backends which check foreign keys at creation time.
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, users::Entity).await?;
    create_table(db, sessions::Entity).await?;
    create_table(db, profiles::Entity).await?;
    create_table(db, article_columns::Entity).await?;
    create_table(db, articles::Entity).await?;
    create_table(db, tags::Entity).await?;
    create_table(db, article_tags::Entity).await?;
    create_table(db, comments::Entity).await?;
    create_table(db, notifications::Entity).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();

    db.execute(backend.build(&stmt)).await.map(|_| {
        log::debug!("create_table: {} ready", entity.table_name());
    })
}
