use sqlx::Row;

fn database_url() -> String {
    // Integration tests do not go through Settings, so read .env directly.
    dotenvy::dotenv().ok();

    if let Ok(url) = std::env::var("DATABASE_URL") {
        if !url.trim().is_empty() {
            return url;
        }
    }

    let server = std::env::var("POSTGRES_SERVER").unwrap_or_else(|_| "localhost".into());
    let port = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".into());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "coursework".into());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();
    let db = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "coursework_db".into());

    format!("postgresql://{user}:{password}@{server}:{port}/{db}")
}

#[tokio::test]
#[ignore = "requires postgres"]
async fn migrations_apply_and_tables_exist() -> anyhow::Result<()> {
    let pool =
        sqlx::postgres::PgPoolOptions::new().max_connections(1).connect(&database_url()).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new("migrations")).await?;
    migrator.run(&pool).await?;

    let tables = [
        "users",
        "groups",
        "subgroups",
        "subgroup_members",
        "resources",
        "assignments",
        "assignment_files",
        "submissions",
        "submission_files",
    ];

    for table in tables {
        let row = sqlx::query("SELECT to_regclass($1)::text").bind(table).fetch_one(&pool).await?;
        let regclass: Option<String> = row.try_get(0)?;
        assert!(regclass.is_some(), "expected table {table} to exist after migrations");
    }

    let row = sqlx::query(
        "SELECT count(*) FROM pg_indexes WHERE tablename = 'submissions' AND indexdef ILIKE '%UNIQUE%'",
    )
    .fetch_one(&pool)
    .await?;
    let unique_indexes: i64 = row.try_get(0)?;
    assert!(unique_indexes >= 1, "submissions must be unique per assignment and student");

    Ok(())
}
