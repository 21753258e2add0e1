//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use marvo_core::{CartItemId, Price, PriceError, ProductId};

/// A stored cart line keyed by the anonymous cart token.
#[derive(Debug, Clone, FromRow)]
pub struct CartItem {
    pub id: CartItemId,
    pub session_id: String,
    pub product_id: ProductId,
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
    pub added_at: DateTime<Utc>,
}

/// A cart line joined with its product's live name, price and image.
#[derive(Debug, Clone, FromRow)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Price,
    pub image_url: Option<String>,
    pub stock: i64,
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl CartLine {
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the total does not fit in a `Decimal`.
    pub fn line_total(&self) -> Result<Decimal, PriceError> {
        self.unit_price.times(self.quantity)
    }
}

/// Sum of `unit price × quantity` over `lines`.
///
/// # Errors
///
/// Returns `PriceError::Overflow` if the sum does not fit in a `Decimal`.
pub fn cart_total(lines: &[CartLine]) -> Result<Decimal, PriceError> {
    lines.iter().try_fold(Decimal::ZERO, |total, line| {
        total
            .checked_add(line.line_total()?)
            .ok_or(PriceError::Overflow)
    })
}
