//! Seeds a handful of sample tariffs and a promo code into a freshly
//! migrated local database. Local-development tooling only — there is no
//! administrative CLI for managing these in production; that surface is
//! explicitly out of scope (spec.md's Non-goals).

use creditcore_infra_db::Db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/creditcore".to_string());
    let db = Db::connect(&database_url, 5).await?;
    db.migrate().await?;

    let pool = db.pool();

    let starter_id: (uuid::Uuid,) = sqlx::query_as(
        r#"
        insert into tariffs (slug, name, description, price, tokens, period_unit, period_value, subscription_fee, min_payment, sort_order)
        values ('starter', 'Starter', '1000 tokens, no subscription required', 100, 1000, 'month', 1, 0, 10, 0)
        on conflict (slug) do update set name = excluded.name
        returning id
        "#,
    )
    .fetch_one(pool)
    .await?;

    sqlx::query(
        r#"
        insert into tariffs (slug, name, description, price, tokens, period_unit, period_value, subscription_fee, min_payment, sort_order)
        values ('pro', 'Pro', '5000 tokens plus a monthly subscription', 400, 5000, 'month', 1, 100, 10, 1)
        on conflict (slug) do update set name = excluded.name
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        insert into promo_codes (code, discount_type, discount_value, max_uses, valid_from, tariff_id, is_active)
        values ('WELCOME10', 'percent', 10, 100, now(), $1, true)
        on conflict do nothing
        "#,
    )
    .bind(starter_id.0)
    .execute(pool)
    .await?;

    tracing::info!("seed data applied");
    Ok(())
}
