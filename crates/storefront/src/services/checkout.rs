//! Checkout: turn a cart into an order.
//!
//! Everything here runs on one transaction supplied by the caller. Any
//! error leaves the database untouched once the transaction is dropped.

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use thiserror::Error;
use tracing::instrument;

use marvo_core::{OrderNumber, PointsReason, Price, ProductId, UserId};

use crate::db::{CartRepository, OrderRepository, ProductRepository, RepositoryError};
use crate::models::cart::cart_total;
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem};
use crate::services::points::{award_points, points_for_total};

/// Attempts at drawing an unused order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 10;

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,

    #[error("shipping address and phone are required")]
    MissingShipping,

    #[error("order total is above the ₱99,999,999.99 limit")]
    TotalTooLarge,

    #[error("not enough stock for {product_name}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Checkout form input.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutRequest<'a> {
    pub shipping_address: &'a str,
    pub phone: &'a str,
    pub notes: Option<&'a str>,
    /// Add the fixed charity donation to the order.
    pub donate: bool,
}

/// A freshly placed order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub points_awarded: i64,
}

/// The optional donation added at checkout: 1.00.
#[must_use]
pub fn donation_amount() -> Decimal {
    Decimal::new(100, 2)
}

/// Checkout service over the caller's transaction.
pub struct CheckoutService<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CheckoutService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Place an order for everything in the cart.
    ///
    /// Freezes current prices into order lines, takes the ordered units out
    /// of stock, empties the cart and credits one point per whole unit of
    /// the item total.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::MissingShipping` if address or phone is blank.
    /// Returns `CheckoutError::EmptyCart` if the cart has no lines.
    /// Returns `CheckoutError::TotalTooLarge` if the item total exceeds
    /// `Price::MAX`.
    /// Returns `CheckoutError::InsufficientStock` if a product sold out since
    /// it was added. Nothing is written in that case once the caller drops
    /// the transaction.
    #[instrument(skip(self, cart_token, request), fields(user_id = %user_id))]
    pub async fn place_order(
        &mut self,
        user_id: UserId,
        cart_token: &str,
        request: &CheckoutRequest<'_>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let shipping_address = request.shipping_address.trim();
        let phone = request.phone.trim();
        if shipping_address.is_empty() || phone.is_empty() {
            return Err(CheckoutError::MissingShipping);
        }

        let lines = CartRepository::new(&mut *self.conn)
            .lines_for_session(cart_token)
            .await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let total = cart_total(&lines)
            .and_then(Price::new)
            .map_err(|_| CheckoutError::TotalTooLarge)?;
        let donation = if request.donate {
            Some(to_price(donation_amount())?)
        } else {
            None
        };
        let order_number = self.unused_order_number().await?;

        let mut orders = OrderRepository::new(&mut *self.conn);
        let order = orders
            .create(&NewOrder {
                user_id,
                order_number,
                total_amount: total,
                donation_amount: donation,
                shipping_address: shipping_address.to_owned(),
                phone: phone.to_owned(),
                notes: request
                    .notes
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_owned),
            })
            .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = OrderRepository::new(&mut *self.conn)
                .add_item(
                    order.id,
                    &NewOrderItem {
                        product_id: line.product_id,
                        product_name: line.product_name.clone(),
                        quantity: line.quantity,
                        price: line.unit_price,
                        size: line.size.clone(),
                        color: line.color.clone(),
                    },
                )
                .await?;
            items.push(item);

            let taken = ProductRepository::new(&mut *self.conn)
                .decrement_stock(line.product_id, line.quantity)
                .await?;
            if !taken {
                tracing::warn!(product_id = %line.product_id, "Checkout aborted: stock ran out");
                return Err(CheckoutError::InsufficientStock {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                });
            }
        }

        CartRepository::new(&mut *self.conn)
            .clear_session(cart_token)
            .await?;

        let points = points_for_total(total.amount());
        if points > 0 {
            award_points(&mut *self.conn, user_id, points, PointsReason::Order, Some(order.id))
                .await?;
        }

        tracing::info!(
            order_number = %order.order_number,
            total = %total,
            points,
            "Order placed"
        );

        Ok(PlacedOrder {
            order,
            items,
            points_awarded: points,
        })
    }

    async fn unused_order_number(&mut self) -> Result<OrderNumber, CheckoutError> {
        let mut orders = OrderRepository::new(&mut *self.conn);
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let number = generate_order_number();
            if !orders.number_exists(&number).await? {
                return Ok(number);
            }
        }
        Err(RepositoryError::Conflict("no unused order number found".to_owned()).into())
    }
}

/// Draw an order number for the current second.
#[must_use]
pub fn generate_order_number() -> OrderNumber {
    let suffix = rand::rng().random_range(0..10_000_u16);
    OrderNumber::generate(Utc::now(), suffix)
}

fn to_price(amount: Decimal) -> Result<Price, RepositoryError> {
    Price::new(amount).map_err(|e| RepositoryError::DataCorruption(format!("bad amount {amount}: {e}")))
}
