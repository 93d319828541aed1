//! Offer repository
//!
//! Coupon lookups and the transactional redemption path. Redemption never
//! reads counters into memory: both caps are enforced by guarded UPDATE
//! statements inside one transaction, so two near-simultaneous orders
//! racing for the last slot of a capped code serialize at the store and
//! exactly one wins.

use super::{RepoError, RepoResult};
use shared::offer::{DiscountKind, Offer};
use shared::util::now_millis;
use sqlx::SqlitePool;

const SELECT_COLUMNS: &str = "code, kind, value, max_discount, valid_from, valid_to, min_order_amount, usage_limit, per_user_limit, used_count, first_order_only";

#[derive(Debug, sqlx::FromRow)]
struct OfferRow {
    code: String,
    kind: String,
    value: f64,
    max_discount: Option<f64>,
    valid_from: i64,
    valid_to: i64,
    min_order_amount: f64,
    usage_limit: Option<i64>,
    per_user_limit: i64,
    used_count: i64,
    first_order_only: bool,
}

fn row_to_offer(row: OfferRow) -> RepoResult<Offer> {
    let kind = match row.kind.as_str() {
        "PERCENT" => DiscountKind::Percent {
            value: row.value,
            max_discount: row.max_discount,
        },
        "FIXED" => DiscountKind::Fixed { value: row.value },
        other => {
            return Err(RepoError::Database(format!(
                "invalid discount kind {other}"
            )));
        }
    };
    Ok(Offer {
        code: row.code,
        kind,
        valid_from: row.valid_from,
        valid_to: row.valid_to,
        min_order_amount: row.min_order_amount,
        usage_limit: row.usage_limit,
        per_user_limit: row.per_user_limit,
        used_count: row.used_count,
        first_order_only: row.first_order_only,
    })
}

/// Case-insensitive lookup; codes are stored uppercase.
pub async fn find_by_code(pool: &SqlitePool, code: &str) -> RepoResult<Option<Offer>> {
    let row = sqlx::query_as::<_, OfferRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM offer WHERE code = ?"
    ))
    .bind(code.trim().to_uppercase())
    .fetch_optional(pool)
    .await?;
    row.map(row_to_offer).transpose()
}

pub async fn create(pool: &SqlitePool, offer: &Offer) -> RepoResult<()> {
    let (kind, value, max_discount) = match &offer.kind {
        DiscountKind::Percent {
            value,
            max_discount,
        } => ("PERCENT", *value, *max_discount),
        DiscountKind::Fixed { value } => ("FIXED", *value, None),
    };
    let now = now_millis();

    let result = sqlx::query(
        "INSERT INTO offer (code, kind, value, max_discount, valid_from, valid_to, min_order_amount, usage_limit, per_user_limit, used_count, first_order_only, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(offer.code.trim().to_uppercase())
    .bind(kind)
    .bind(value)
    .bind(max_discount)
    .bind(offer.valid_from)
    .bind(offer.valid_to)
    .bind(offer.min_order_amount)
    .bind(offer.usage_limit)
    .bind(offer.per_user_limit)
    .bind(offer.used_count)
    .bind(offer.first_order_only)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(RepoError::Duplicate(
            format!("Offer {} already exists", offer.code),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Redemptions recorded for one user key on one code.
pub async fn user_usage(pool: &SqlitePool, code: &str, user_key: &str) -> RepoResult<i64> {
    let uses: Option<i64> =
        sqlx::query_scalar("SELECT uses FROM offer_usage WHERE offer_code = ? AND user_key = ?")
            .bind(code.trim().to_uppercase())
            .bind(user_key)
            .fetch_optional(pool)
            .await?;
    Ok(uses.unwrap_or(0))
}

/// Consume one redemption slot for `user_key`, atomically.
///
/// One transaction, two guarded writes:
/// 1. global counter: `used_count + 1` only while under `usage_limit`
/// 2. per-user ledger: guarded upsert against `per_user_limit`
///
/// Either guard failing rolls the whole transaction back and returns
/// `RepoError::Conflict`; the counters are left exactly as found.
pub async fn redeem(
    pool: &SqlitePool,
    code: &str,
    user_key: &str,
    per_user_limit: i64,
) -> RepoResult<()> {
    let code = code.trim().to_uppercase();
    let mut tx = pool.begin().await?;

    let rows = sqlx::query(
        "UPDATE offer SET used_count = used_count + 1, updated_at = ? WHERE code = ? AND (usage_limit IS NULL OR used_count < usage_limit)",
    )
    .bind(now_millis())
    .bind(&code)
    .execute(&mut *tx)
    .await?;

    if rows.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(RepoError::Conflict(format!(
            "Offer {code} is exhausted or unknown"
        )));
    }

    if per_user_limit < 1 {
        tx.rollback().await?;
        return Err(RepoError::Conflict(format!(
            "Offer {code} per-user limit reached"
        )));
    }

    let rows = sqlx::query(
        "INSERT INTO offer_usage (offer_code, user_key, uses) VALUES (?, ?, 1) ON CONFLICT(offer_code, user_key) DO UPDATE SET uses = uses + 1 WHERE offer_usage.uses < ?",
    )
    .bind(&code)
    .bind(user_key)
    .bind(per_user_limit)
    .execute(&mut *tx)
    .await?;

    if rows.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(RepoError::Conflict(format!(
            "Offer {code} per-user limit reached"
        )));
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    async fn test_pool() -> (SqlitePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offers.db");
        let db = DbService::new(path.to_str().unwrap()).await.unwrap();
        (db.pool, dir)
    }

    fn capped_offer(code: &str, usage_limit: Option<i64>, per_user_limit: i64) -> Offer {
        let now = now_millis();
        Offer {
            code: code.into(),
            kind: DiscountKind::Fixed { value: 100.0 },
            valid_from: now - 1_000,
            valid_to: now + 60_000,
            min_order_amount: 0.0,
            usage_limit,
            per_user_limit,
            used_count: 0,
            first_order_only: false,
        }
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let (pool, _dir) = test_pool().await;
        create(&pool, &capped_offer("SAVE10", None, 5)).await.unwrap();

        let found = find_by_code(&pool, "save10").await.unwrap();
        assert_eq!(found.unwrap().code, "SAVE10");
    }

    #[tokio::test]
    async fn exhausted_global_cap_rejects_everyone() {
        let (pool, _dir) = test_pool().await;
        create(&pool, &capped_offer("ONCE", Some(1), 5)).await.unwrap();

        redeem(&pool, "ONCE", "alice", 5).await.unwrap();
        let err = redeem(&pool, "ONCE", "bob", 5).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));

        let offer = find_by_code(&pool, "ONCE").await.unwrap().unwrap();
        assert_eq!(offer.used_count, 1);
    }

    #[tokio::test]
    async fn concurrent_last_slot_has_exactly_one_winner() {
        let (pool, _dir) = test_pool().await;
        create(&pool, &capped_offer("LAST", Some(1), 5)).await.unwrap();

        let (a, b) = tokio::join!(
            redeem(&pool, "LAST", "alice", 5),
            redeem(&pool, "LAST", "bob", 5),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

        let offer = find_by_code(&pool, "LAST").await.unwrap().unwrap();
        assert_eq!(offer.used_count, 1);
    }

    #[tokio::test]
    async fn per_user_cap_is_enforced() {
        let (pool, _dir) = test_pool().await;
        create(&pool, &capped_offer("WEEKLY", None, 2)).await.unwrap();

        redeem(&pool, "WEEKLY", "alice", 2).await.unwrap();
        redeem(&pool, "WEEKLY", "alice", 2).await.unwrap();
        let err = redeem(&pool, "WEEKLY", "alice", 2).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));
        assert_eq!(user_usage(&pool, "WEEKLY", "alice").await.unwrap(), 2);

        // Rolled-back attempt must not leak into the global counter
        let offer = find_by_code(&pool, "WEEKLY").await.unwrap().unwrap();
        assert_eq!(offer.used_count, 2);
    }
}
