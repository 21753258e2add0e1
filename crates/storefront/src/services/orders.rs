//! Order lookup and status management.

use sqlx::SqliteConnection;
use thiserror::Error;
use tracing::instrument;

use marvo_core::{OrderNumber, OrderStatus, UserId};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::{Order, OrderDetail};

/// Errors from order lookups and status changes.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error("an order cannot go from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Order history, tracking and admin status changes.
pub struct OrderService<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> OrderService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Fetch an order with its lines, only if `user_id` placed it.
    ///
    /// Someone else's order is reported exactly like a missing one.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist or is not
    /// owned by `user_id`.
    pub async fn track(&mut self, user_id: UserId, number: &str) -> Result<OrderDetail, OrderError> {
        let number = OrderNumber::parse(number).map_err(|_| OrderError::NotFound)?;
        let mut orders = OrderRepository::new(&mut *self.conn);
        let order = orders
            .get_by_number_for_user(&number, user_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let items = orders.items(order.id).await?;
        Ok(OrderDetail { order, items })
    }

    /// A user's order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn history(&mut self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(OrderRepository::new(&mut *self.conn).list_for_user(user_id).await?)
    }

    /// All orders for the admin panel.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list_all(&mut self, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError> {
        Ok(OrderRepository::new(&mut *self.conn).list_all(status).await?)
    }

    /// Move an order to `next`, stamping the milestone time it reaches.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if no order has this number.
    /// Returns `OrderError::InvalidTransition` if the lifecycle forbids the move.
    #[instrument(skip(self))]
    pub async fn advance(&mut self, number: &str, next: OrderStatus) -> Result<Order, OrderError> {
        let number = OrderNumber::parse(number).map_err(|_| OrderError::NotFound)?;
        let mut orders = OrderRepository::new(&mut *self.conn);
        let order = orders
            .get_by_number(&number)
            .await?
            .ok_or(OrderError::NotFound)?;

        if !order.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }

        let updated = orders.update_status(order.id, next).await?;
        tracing::info!(order_number = %number, from = %order.status, to = %next, "Order status changed");
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::cart::{AddToCart, CartService};
    use crate::services::checkout::{CheckoutRequest, CheckoutService};
    use crate::db::testing;

    async fn place(conn: &mut SqliteConnection, user: UserId) -> Order {
        let product = testing::product(conn, "Tee", "100", 10).await;
        CartService::new(conn)
            .add(
                "tok",
                AddToCart {
                    product_id: product,
                    quantity: 1,
                    size: None,
                    color: None,
                },
            )
            .await
            .unwrap();
        CheckoutService::new(conn)
            .place_order(
                user,
                "tok",
                &CheckoutRequest {
                    shipping_address: "Somewhere 1",
                    phone: "0917",
                    notes: None,
                    donate: false,
                },
            )
            .await
            .unwrap()
            .order
    }

    #[tokio::test]
    async fn test_track_only_own_orders() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let owner = testing::user(&mut conn, "owner", "OWNER001").await;
        let other = testing::user(&mut conn, "other", "OTHER001").await;
        let order = place(&mut conn, owner).await;

        let mut service = OrderService::new(&mut conn);
        let detail = service.track(owner, order.order_number.as_str()).await.unwrap();
        assert_eq!(detail.items.len(), 1);

        assert!(matches!(
            service.track(other, order.order_number.as_str()).await,
            Err(OrderError::NotFound)
        ));
        assert!(matches!(
            service.track(owner, "MRV000000000000000000").await,
            Err(OrderError::NotFound)
        ));
        assert!(matches!(service.track(owner, "garbage").await, Err(OrderError::NotFound)));
    }

    #[tokio::test]
    async fn test_advance_follows_lifecycle() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let owner = testing::user(&mut conn, "owner", "OWNER001").await;
        let order = place(&mut conn, owner).await;
        let number = order.order_number.as_str();

        let mut service = OrderService::new(&mut conn);
        assert!(matches!(
            service.advance(number, OrderStatus::Shipped).await,
            Err(OrderError::InvalidTransition { .. })
        ));

        let confirmed = service.advance(number, OrderStatus::Confirmed).await.unwrap();
        assert!(confirmed.confirmed_at.is_some());
        let shipped = service.advance(number, OrderStatus::Shipped).await.unwrap();
        assert!(shipped.shipped_at.is_some());
        assert!(matches!(
            service.advance(number, OrderStatus::Cancelled).await,
            Err(OrderError::InvalidTransition { .. })
        ));
        let delivered = service.advance(number, OrderStatus::Delivered).await.unwrap();
        assert!(delivered.delivered_at.is_some());
        assert_eq!(delivered.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_history_and_admin_list() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let owner = testing::user(&mut conn, "owner", "OWNER001").await;
        place(&mut conn, owner).await;

        let mut service = OrderService::new(&mut conn);
        assert_eq!(service.history(owner).await.unwrap().len(), 1);
        assert_eq!(service.list_all(None).await.unwrap().len(), 1);
        assert!(service.list_all(Some(OrderStatus::Delivered)).await.unwrap().is_empty());
    }
}
