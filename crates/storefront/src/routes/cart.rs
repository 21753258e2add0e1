//! Cart route handlers.
//!
//! Carts belong to the browser session, not the account: the session holds
//! a random cart token created on the first add.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use marvo_core::{CartItemId, ProductId};

use crate::db;
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{
    CsrfForm, CsrfOnly, CsrfProtected, Flash, PageContext, cart_token, ensure_cart_token,
};
use crate::routes::flash_redirect;
use crate::services::cart::{AddToCart, CartView};
use crate::services::{CartError, CartService};
use crate::state::AppState;

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart.html")]
pub struct CartTemplate {
    pub page: PageContext,
    pub cart: CartView,
}

/// Add-to-cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    #[serde(default)]
    pub csrf_token: String,
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    pub size: Option<String>,
    pub color: Option<String>,
}

const fn default_quantity() -> i64 {
    1
}

impl CsrfProtected for AddToCartForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

/// Display the cart at live prices.
#[instrument(skip(state, session, page))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let cart = match cart_token(&session).await? {
        Some(token) => {
            let mut conn = state.pool().acquire().await?;
            CartService::new(&mut conn).view(&token).await?
        }
        None => CartView::default(),
    };

    Ok(CartTemplate { page, cart })
}

/// Add a product to the cart, merging with an identical line.
#[instrument(skip(state, session, form), fields(product_id = %form.product_id, quantity = form.quantity))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    CsrfForm(form): CsrfForm<AddToCartForm>,
) -> Result<Redirect> {
    let token = ensure_cart_token(&session).await?;
    let product_page = format!("/product/{}", form.product_id);

    let mut tx = db::begin(state.pool()).await?;
    let result = CartService::new(&mut tx)
        .add(
            &token,
            AddToCart {
                product_id: form.product_id,
                quantity: form.quantity,
                size: form.size.as_deref(),
                color: form.color.as_deref(),
            },
        )
        .await;

    match result {
        Ok(line) => {
            tx.commit().await?;
            add_breadcrumb(
                "cart",
                "Added to cart",
                Some(&[("product_id", &form.product_id.to_string())]),
            );
            flash_redirect(
                &session,
                Flash::success(format!("Added {} to your cart.", line.product_name)),
                "/cart",
            )
            .await
        }
        Err(CartError::InsufficientStock) => {
            flash_redirect(
                &session,
                Flash::error("Sorry, there is not enough stock for that quantity."),
                &product_page,
            )
            .await
        }
        Err(e @ CartError::InvalidQuantity) => {
            flash_redirect(&session, Flash::error(e.to_string()), &product_page).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Remove a line from the caller's cart.
///
/// A line belonging to another cart is left alone without telling the
/// caller; an unknown id is a 404.
#[instrument(skip(state, session, _form))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<CartItemId>,
    CsrfForm(_form): CsrfForm<CsrfOnly>,
) -> Result<Redirect> {
    let token = cart_token(&session).await?.unwrap_or_default();

    let mut tx = db::begin(state.pool()).await?;
    let removed = CartService::new(&mut tx).remove(&token, id).await?;
    tx.commit().await?;

    if removed {
        flash_redirect(&session, Flash::success("Item removed from your cart."), "/cart").await
    } else {
        tracing::warn!(cart_item_id = %id, "Ignored removal of another cart's item");
        Ok(Redirect::to("/cart"))
    }
}
