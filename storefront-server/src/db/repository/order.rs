//! Order repository
//!
//! Orders live in one row each; items, address, timing and status history
//! are JSON columns. Stage transitions are guarded compare-and-set
//! updates so a stale or duplicate writer can never regress a stage.

use super::{RepoError, RepoResult};
use shared::order::{
    AppliedDiscount, DeliveryAddress, DeliveryTiming, Feedback, Order, OrderItem, PaymentInfo,
    PaymentMethod, Stage, StatusEntry,
};
use sqlx::SqlitePool;

const SELECT_COLUMNS: &str = "id, user_id, items, subtotal, discount_code, discount_amount, total, address, payment_method, paid, timing, instructions, current_stage, status, status_history, feedback_rating, feedback_comment, feedback_at, created_at, updated_at";

/// Flat row shape; nested fields decode from JSON in [`row_to_order`].
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: Option<String>,
    items: String,
    subtotal: f64,
    discount_code: Option<String>,
    discount_amount: Option<f64>,
    total: f64,
    address: String,
    payment_method: String,
    paid: bool,
    timing: String,
    instructions: Option<String>,
    current_stage: i64,
    status: String,
    status_history: String,
    feedback_rating: Option<i64>,
    feedback_comment: Option<String>,
    feedback_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

fn row_to_order(row: OrderRow) -> RepoResult<Order> {
    let items: Vec<OrderItem> = serde_json::from_str(&row.items)?;
    let address: DeliveryAddress = serde_json::from_str(&row.address)?;
    let timing: DeliveryTiming = serde_json::from_str(&row.timing)?;
    let status_history: Vec<StatusEntry> = serde_json::from_str(&row.status_history)?;

    let current_stage = Stage::from_code(row.current_stage as i8)
        .ok_or_else(|| RepoError::Database(format!("invalid stage code {}", row.current_stage)))?;

    let method: PaymentMethod = serde_json::from_str(&format!("\"{}\"", row.payment_method))
        .map_err(|_| RepoError::Database(format!("invalid payment method {}", row.payment_method)))?;

    let discount = match (row.discount_code, row.discount_amount) {
        (Some(code), Some(amount)) => Some(AppliedDiscount { code, amount }),
        _ => None,
    };

    let feedback = match (row.feedback_rating, row.feedback_at) {
        (Some(rating), Some(submitted_at)) => Some(Feedback {
            rating: rating as u8,
            comment: row.feedback_comment,
            submitted_at,
        }),
        _ => None,
    };

    Ok(Order {
        id: row.id,
        user_id: row.user_id,
        items,
        subtotal: row.subtotal,
        discount,
        total: row.total,
        address,
        payment: PaymentInfo {
            method,
            paid: row.paid,
        },
        timing,
        instructions: row.instructions,
        current_stage,
        status: row.status,
        status_history,
        feedback,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub async fn create(pool: &SqlitePool, order: &Order) -> RepoResult<()> {
    let items = serde_json::to_string(&order.items)?;
    let address = serde_json::to_string(&order.address)?;
    let timing = serde_json::to_string(&order.timing)?;
    let history = serde_json::to_string(&order.status_history)?;
    let method = serde_json::to_string(&order.payment.method)?
        .trim_matches('"')
        .to_string();

    sqlx::query(
        "INSERT INTO orders (id, user_id, items, subtotal, discount_code, discount_amount, total, address, payment_method, paid, timing, instructions, current_stage, status, status_history, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(order.id)
    .bind(&order.user_id)
    .bind(items)
    .bind(order.subtotal)
    .bind(order.discount.as_ref().map(|d| d.code.clone()))
    .bind(order.discount.as_ref().map(|d| d.amount))
    .bind(order.total)
    .bind(address)
    .bind(method)
    .bind(order.payment.paid)
    .bind(timing)
    .bind(&order.instructions)
    .bind(order.current_stage.code() as i64)
    .bind(&order.status)
    .bind(history)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM orders WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    row.map(row_to_order).transpose()
}

pub async fn find_all(pool: &SqlitePool, limit: i32, offset: i32) -> RepoResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT ? OFFSET ?"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(row_to_order).collect()
}

/// True if this caller already has any order (first-order-only checks).
///
/// Authenticated callers match on user id; guests match on the delivery
/// phone snapshot inside the address JSON.
pub async fn has_prior_orders(
    pool: &SqlitePool,
    user_id: Option<&str>,
    phone: &str,
) -> RepoResult<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM orders WHERE (?1 IS NOT NULL AND user_id = ?1) OR (?1 IS NULL AND user_id IS NULL AND json_extract(address, '$.phone') = ?2)",
    )
    .bind(user_id)
    .bind(phone)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Apply a stage transition with a compare-and-set on the previous stage.
///
/// The caller computes the new history/status from the order it read; the
/// `WHERE current_stage = ?` guard rejects the write if another request
/// got there first, so history never skips or duplicates an entry.
pub async fn update_stage(
    pool: &SqlitePool,
    id: i64,
    from: Stage,
    to: Stage,
    history: &[StatusEntry],
    updated_at: i64,
) -> RepoResult<Order> {
    let history_json = serde_json::to_string(history)?;

    let rows = sqlx::query(
        "UPDATE orders SET current_stage = ?, status = ?, status_history = ?, updated_at = ? WHERE id = ? AND current_stage = ?",
    )
    .bind(to.code() as i64)
    .bind(to.label())
    .bind(history_json)
    .bind(updated_at)
    .bind(id)
    .bind(from.code() as i64)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!(
            "Order {id} changed concurrently (expected stage {})",
            from.code()
        )));
    }

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Order {id} not found")))
}

/// Record one-time feedback. The guard enforces "delivered, no feedback
/// yet" at the store so a duplicate submission can never overwrite.
pub async fn set_feedback(
    pool: &SqlitePool,
    id: i64,
    rating: u8,
    comment: Option<&str>,
    submitted_at: i64,
) -> RepoResult<Order> {
    let rows = sqlx::query(
        "UPDATE orders SET feedback_rating = ?, feedback_comment = ?, feedback_at = ?, updated_at = ? WHERE id = ? AND current_stage = ? AND feedback_rating IS NULL",
    )
    .bind(rating as i64)
    .bind(comment)
    .bind(submitted_at)
    .bind(submitted_at)
    .bind(id)
    .bind(Stage::Delivered.code() as i64)
    .execute(pool)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!(
            "Order {id} is not awaiting feedback"
        )));
    }

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Order {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use shared::order::{Crust, Size};
    use shared::util::now_millis;

    async fn test_pool() -> (SqlitePool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.db");
        let db = DbService::new(path.to_str().unwrap()).await.unwrap();
        (db.pool, dir)
    }

    fn sample_order(id: i64) -> Order {
        let now = now_millis();
        Order {
            id,
            user_id: Some("u1".into()),
            items: vec![OrderItem {
                product_id: "p1".into(),
                name: "Margherita".into(),
                size: Size::Medium,
                crust: Crust {
                    name: "Classic".into(),
                    surcharge: 0.0,
                },
                add_ons: vec![],
                unit_price: 1440.0,
                quantity: 1,
                line_total: 1440.0,
            }],
            subtotal: 1440.0,
            discount: None,
            total: 1440.0,
            address: DeliveryAddress {
                name: "Ada".into(),
                phone: "555-0100".into(),
                email: None,
                street: "1 Loop Rd".into(),
                city: "Springfield".into(),
                postal_code: "12345".into(),
            },
            payment: PaymentInfo {
                method: PaymentMethod::Card,
                paid: true,
            },
            timing: DeliveryTiming::Asap,
            instructions: None,
            current_stage: Stage::Placed,
            status: Stage::Placed.label().into(),
            status_history: vec![StatusEntry::new(Stage::Placed, now)],
            feedback: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_and_read_round_trip() {
        let (pool, _dir) = test_pool().await;
        let order = sample_order(1001);
        create(&pool, &order).await.unwrap();

        let loaded = find_by_id(&pool, 1001).await.unwrap().unwrap();
        assert_eq!(loaded.items, order.items);
        assert_eq!(loaded.current_stage, Stage::Placed);
        assert_eq!(loaded.status_history.len(), 1);
    }

    #[tokio::test]
    async fn stale_stage_update_is_rejected() {
        let (pool, _dir) = test_pool().await;
        let order = sample_order(1002);
        create(&pool, &order).await.unwrap();

        let mut history = order.status_history.clone();
        history.push(StatusEntry::new(Stage::Preparing, now_millis()));
        update_stage(&pool, 1002, Stage::Placed, Stage::Preparing, &history, now_millis())
            .await
            .unwrap();

        // Second writer still thinks the order is at Placed
        let err = update_stage(&pool, 1002, Stage::Placed, Stage::Preparing, &history, now_millis())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));
    }

    #[tokio::test]
    async fn feedback_only_once_and_only_delivered() {
        let (pool, _dir) = test_pool().await;
        let order = sample_order(1003);
        create(&pool, &order).await.unwrap();

        // Not delivered yet
        let err = set_feedback(&pool, 1003, 5, None, now_millis()).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));

        // Walk to Delivered
        let mut current = order;
        for to in [Stage::Preparing, Stage::Baking, Stage::OutForDelivery, Stage::Delivered] {
            let mut history = current.status_history.clone();
            history.push(StatusEntry::new(to, now_millis()));
            current = update_stage(&pool, 1003, current.current_stage, to, &history, now_millis())
                .await
                .unwrap();
        }

        let updated = set_feedback(&pool, 1003, 4, Some("great"), now_millis())
            .await
            .unwrap();
        assert_eq!(updated.feedback.as_ref().unwrap().rating, 4);

        let err = set_feedback(&pool, 1003, 1, None, now_millis()).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));
    }
}
