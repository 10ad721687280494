use anyhow::Context;
use async_trait::async_trait;
use diesel::{BelongingToDsl, ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{
    AsyncConnection, AsyncPgConnection, RunQueryDsl, pooled_connection::bb8::PooledConnection,
};
use tracing::debug;

use super::{LedgerError, LedgerResult, OrderLedger, check_transition};
use crate::{
    db::DbPool,
    models::{CreateOrderEntity, CreateOrderItemEntity, OrderEntity, OrderItemEntity},
    order::{NewOrder, Order, OrderStatus},
    schema::{order_items, orders},
};

impl From<diesel::result::Error> for LedgerError {
    fn from(err: diesel::result::Error) -> Self {
        LedgerError::Storage(err.into())
    }
}

/// Order ledger backed by Postgres.
///
/// Writes run inside transactions; status changes take a row lock on the
/// order first so concurrent transitions on the same order serialize.
#[derive(Clone)]
pub struct PgOrderLedger {
    pool: DbPool,
}

impl PgOrderLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> LedgerResult<PooledConnection<'_, AsyncPgConnection>> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;
        Ok(conn)
    }
}

async fn load_items(
    conn: &mut AsyncPgConnection,
    order: &OrderEntity,
) -> LedgerResult<Vec<OrderItemEntity>> {
    let items = OrderItemEntity::belonging_to(order)
        .select(OrderItemEntity::as_select())
        .order_by(order_items::id.asc())
        .load(conn)
        .await
        .context("Failed to get order items")?;
    Ok(items)
}

async fn load_order(conn: &mut AsyncPgConnection, id: i32) -> LedgerResult<Order> {
    let order: OrderEntity = orders::table
        .find(id)
        .select(OrderEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to get order")?
        .ok_or(LedgerError::OrderNotFound(id))?;

    let items = load_items(conn, &order).await?;
    Ok(order.into_order(items)?)
}

/// Loads the order row with `FOR UPDATE`; must run inside a transaction.
async fn lock_order(conn: &mut AsyncPgConnection, id: i32) -> LedgerResult<OrderEntity> {
    orders::table
        .find(id)
        .select(OrderEntity::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()
        .context("Failed to lock order")?
        .ok_or(LedgerError::OrderNotFound(id))
}

#[async_trait]
impl OrderLedger for PgOrderLedger {
    async fn create_order(&self, new_order: NewOrder) -> LedgerResult<Order> {
        if new_order.items().is_empty() {
            return Err(LedgerError::NoItems);
        }

        let mut conn = self.conn().await?;

        let order = conn
            .transaction(move |conn| {
                Box::pin(async move {
                    let order: OrderEntity = diesel::insert_into(orders::table)
                        .values(CreateOrderEntity::from(&new_order))
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to create order")?;

                    let items: Vec<CreateOrderItemEntity> = new_order
                        .items()
                        .iter()
                        .map(|item| CreateOrderItemEntity::new(order.id, item))
                        .collect();

                    let items: Vec<OrderItemEntity> = diesel::insert_into(order_items::table)
                        .values(items)
                        .returning(OrderItemEntity::as_returning())
                        .get_results(conn)
                        .await
                        .context("Failed to create order items")?;

                    Ok::<Order, LedgerError>(order.into_order(items)?)
                })
            })
            .await?;

        debug!(order_id = order.id, total = order.total, "Order created");
        Ok(order)
    }

    async fn get_order(&self, id: i32) -> LedgerResult<Order> {
        let mut conn = self.conn().await?;

        load_order(&mut conn, id).await
    }

    async fn update_status(&self, id: i32, status: OrderStatus) -> LedgerResult<Order> {
        let mut conn = self.conn().await?;

        conn.transaction(move |conn| {
            Box::pin(async move {
                let current = lock_order(conn, id).await?;
                if check_transition(current.status()?, status)? {
                    diesel::update(orders::table.find(id))
                        .set((
                            orders::status.eq(status.to_string()),
                            orders::updated_at.eq(diesel::dsl::now),
                        ))
                        .execute(conn)
                        .await
                        .context("Failed to update order status")?;
                }

                load_order(conn, id).await
            })
        })
        .await
    }

    async fn attach_gateway_references(
        &self,
        id: i32,
        gateway_order_ref: &str,
        gateway_payment_ref: Option<&str>,
    ) -> LedgerResult<Order> {
        let mut conn = self.conn().await?;

        let gateway_order_ref = gateway_order_ref.to_string();
        let gateway_payment_ref = gateway_payment_ref.map(str::to_string);

        conn.transaction(move |conn| {
            Box::pin(async move {
                let current = lock_order(conn, id).await?;
                let payment_ref = gateway_payment_ref.or(current.gateway_payment_ref);

                diesel::update(orders::table.find(id))
                    .set((
                        orders::gateway_order_ref.eq(Some(gateway_order_ref)),
                        orders::gateway_payment_ref.eq(payment_ref),
                        orders::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .await
                    .context("Failed to attach gateway references")?;

                load_order(conn, id).await
            })
        })
        .await
    }

    async fn record_payment(
        &self,
        id: i32,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
    ) -> LedgerResult<Order> {
        let mut conn = self.conn().await?;

        let gateway_order_ref = gateway_order_ref.to_string();
        let gateway_payment_ref = gateway_payment_ref.to_string();

        conn.transaction(move |conn| {
            Box::pin(async move {
                let current = lock_order(conn, id).await?;
                let status = current.status()?;
                if status != OrderStatus::Pending {
                    return Err(LedgerError::InvalidTransition {
                        from: status,
                        to: OrderStatus::Paid,
                    });
                }

                diesel::update(orders::table.find(id))
                    .set((
                        orders::status.eq(OrderStatus::Paid.to_string()),
                        orders::gateway_order_ref.eq(Some(gateway_order_ref)),
                        orders::gateway_payment_ref.eq(Some(gateway_payment_ref)),
                        orders::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .await
                    .context("Failed to record payment")?;

                load_order(conn, id).await
            })
        })
        .await
    }
}
