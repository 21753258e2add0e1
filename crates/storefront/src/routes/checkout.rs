//! Checkout route handlers: cash-on-delivery order placement.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use marvo_core::format_amount;

use crate::db::{self, UserRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CsrfForm, CsrfProtected, Flash, PageContext, RequireAuth, cart_token};
use crate::routes::flash_redirect;
use crate::services::cart::CartView;
use crate::services::checkout::{CheckoutRequest, donation_amount};
use crate::services::{CartService, CheckoutError, CheckoutService};
use crate::state::AppState;

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub shipping_address: String,
    pub phone: String,
    /// Formatted optional donation, e.g. `₱1.00`.
    pub donation: String,
}

/// Checkout form data.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub shipping_address: String,
    #[serde(default)]
    pub phone: String,
    pub notes: Option<String>,
    /// Present when the donation box is ticked.
    pub donate: Option<String>,
}

impl CsrfProtected for CheckoutForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

/// Display the checkout form, pre-filled from the profile.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn checkout_page(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let mut conn = state.pool().acquire().await?;

    let cart = match cart_token(&session).await? {
        Some(token) => CartService::new(&mut conn).view(&token).await?,
        None => CartView::default(),
    };
    if cart.is_empty() {
        return Ok(flash_redirect(&session, Flash::info("Your cart is empty."), "/cart")
            .await?
            .into_response());
    }
    if cart.total.is_none() {
        let notice = Flash::error(format!("Sorry, the {}.", CheckoutError::TotalTooLarge));
        return Ok(flash_redirect(&session, notice, "/cart")
            .await?
            .into_response());
    }

    let profile = UserRepository::new(&mut conn)
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_owned()))?;
    drop(conn);

    let page = PageContext::load(&session, &state).await?;
    Ok(CheckoutTemplate {
        page,
        cart,
        shipping_address: profile.shipping_address(),
        phone: profile.phone.unwrap_or_default(),
        donation: format_amount(donation_amount()),
    }
    .into_response())
}

/// Turn the cart into an order.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    CsrfForm(form): CsrfForm<CheckoutForm>,
) -> Result<Redirect> {
    let Some(token) = cart_token(&session).await? else {
        return flash_redirect(&session, Flash::info("Your cart is empty."), "/cart").await;
    };

    let request = CheckoutRequest {
        shipping_address: &form.shipping_address,
        phone: &form.phone,
        notes: form.notes.as_deref(),
        donate: form.donate.is_some(),
    };

    let mut tx = db::begin(state.pool()).await?;
    let result = CheckoutService::new(&mut tx)
        .place_order(user.id, &token, &request)
        .await;

    match result {
        Ok(placed) => {
            tx.commit().await?;
            let number = placed.order.order_number;
            add_breadcrumb("checkout", "Order placed", Some(&[("order_number", number.as_str())]));
            flash_redirect(
                &session,
                Flash::success(format!(
                    "Order {number} placed! You earned {} points.",
                    placed.points_awarded
                )),
                &format!("/order_tracking/{number}"),
            )
            .await
        }
        Err(CheckoutError::EmptyCart) => {
            flash_redirect(&session, Flash::info("Your cart is empty."), "/cart").await
        }
        Err(e @ CheckoutError::TotalTooLarge) => {
            flash_redirect(&session, Flash::error(format!("Sorry, the {e}.")), "/cart").await
        }
        Err(e @ CheckoutError::MissingShipping) => {
            flash_redirect(&session, Flash::error(e.to_string()), "/checkout").await
        }
        Err(e @ CheckoutError::InsufficientStock { .. }) => {
            // Dropping the transaction rolls back anything already written
            drop(tx);
            tracing::warn!(error = %e, "Checkout aborted");
            flash_redirect(&session, Flash::error(format!("Sorry, {e}.")), "/cart").await
        }
        Err(e) => Err(e.into()),
    }
}
