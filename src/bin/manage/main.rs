use anyhow::{bail, Context};
use env_logger::Env;
use rublog::article::insert_column;
use rublog::db::init_db;
use rublog::user::{find_user_by_name, hash_password, insert_new_user};

const USAGE: &str = "usage:
    manage create-superuser <name> <password> [email]
    manage create-column <title>";

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["create-superuser", name, password, rest @ ..] if rest.len() <= 1 => {
            let email = rest.first().copied().unwrap_or_default();
            let db = init_db(database_url).await?;

            if find_user_by_name(&db, name).await?.is_some() {
                bail!("a user named {} already exists", name);
            }

            let hash = hash_password(password)
                .map_err(|e| anyhow::anyhow!("could not hash password: {}", e))?;
            let user = insert_new_user(&db, name, email, &hash, true).await?;
            println!("Created superuser {} (id {})", user.username, user.id);
        }
        ["create-column", title] => {
            let db = init_db(database_url).await?;
            let column = insert_column(&db, title).await?;
            println!("Created column {} (id {})", column.title, column.id);
        }
        _ => bail!("{}", USAGE),
    }

    Ok(())
}
