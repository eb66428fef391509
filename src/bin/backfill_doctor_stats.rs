use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

// id, rating, reviews, success_rate, experience
const STATS: [(i64, f64, i32, i32, i32); 3] = [
    (1, 4.9, 120, 98, 12),
    (2, 4.8, 85, 95, 8),
    (3, 4.7, 200, 99, 15),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Usage: DATABASE_URL=postgres://... backfill_doctor_stats"))?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;

    for (id, rating, reviews, success_rate, experience) in STATS {
        let updated = sqlx::query(
            r#"
            UPDATE doctor
            SET rating = $2, reviews = $3, success_rate = $4, experience = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(rating)
        .bind(reviews)
        .bind(success_rate)
        .bind(experience)
        .execute(&pool)
        .await?
        .rows_affected();

        if updated == 0 {
            tracing::warn!(doctor_id = id, "doctor not found, skipped");
        } else {
            tracing::info!(doctor_id = id, "doctor stats updated");
        }
    }

    Ok(())
}
