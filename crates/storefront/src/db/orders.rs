//! Order repository.

use chrono::Utc;
use sqlx::SqliteConnection;

use marvo_core::{OrderId, OrderNumber, OrderStatus, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem};

const ORDER_COLUMNS: &str = "id, user_id, order_number, total_amount, donation_amount, \
                             payment_method, status, shipping_address, phone, notes, \
                             created_at, confirmed_at, shipped_at, delivered_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, price, size, color";

/// Repository for order database operations.
pub struct OrderRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> OrderRepository<'c> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Insert a pending order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let created = sqlx::query_as::<_, Order>(&format!(
            r"
            INSERT INTO orders
                (user_id, order_number, total_amount, donation_amount, shipping_address,
                 phone, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(&order.order_number)
        .bind(order.total_amount)
        .bind(order.donation_amount)
        .bind(&order.shipping_address)
        .bind(&order.phone)
        .bind(&order.notes)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(conflict_on_unique("order number"))?;
        Ok(created)
    }

    /// Append a line to an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_item(
        &mut self,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItem, RepositoryError> {
        let created = sqlx::query_as::<_, OrderItem>(&format!(
            r"
            INSERT INTO order_items (order_id, product_id, product_name, quantity, price, size, color)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {ITEM_COLUMNS}
            "
        ))
        .bind(order_id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.price)
        .bind(&item.size)
        .bind(&item.color)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(created)
    }

    /// Whether an order number has been used.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn number_exists(&mut self, number: &OrderNumber) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE order_number = ?)")
                .bind(number)
                .fetch_one(&mut *self.conn)
                .await?;
        Ok(exists)
    }

    /// Get an order by its public number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&mut self, number: &OrderNumber) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?"
        ))
        .bind(number)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(order)
    }

    /// Get an order by number, only if `user_id` placed it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number_for_user(
        &mut self,
        number: &OrderNumber,
        user_id: UserId,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ? AND user_id = ?"
        ))
        .bind(number)
        .bind(user_id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(order)
    }

    /// Lines of an order in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ? ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(items)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(orders)
    }

    /// Every order, newest first, optionally narrowed to one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&mut self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(status)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(orders)
    }

    /// Set an order's status and stamp the matching milestone column.
    ///
    /// Callers validate the transition; this only writes it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let milestone = match status {
            OrderStatus::Confirmed => Some("confirmed_at"),
            OrderStatus::Shipped => Some("shipped_at"),
            OrderStatus::Delivered => Some("delivered_at"),
            OrderStatus::Pending | OrderStatus::Cancelled => None,
        };

        let sql = milestone.map_or_else(
            || format!("UPDATE orders SET status = ?1 WHERE id = ?2 RETURNING {ORDER_COLUMNS}"),
            |column| {
                format!(
                    "UPDATE orders SET status = ?1, {column} = ?3 WHERE id = ?2 RETURNING {ORDER_COLUMNS}"
                )
            },
        );

        let mut query = sqlx::query_as::<_, Order>(&sql).bind(status).bind(id);
        if milestone.is_some() {
            query = query.bind(Utc::now());
        }

        query
            .fetch_optional(&mut *self.conn)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
