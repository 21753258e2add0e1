//! Account route handlers.
//!
//! All routes require authentication and only ever show the caller's own
//! data.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::instrument;

use crate::db::{PointsRepository, UserRepository};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::models::{Order, OrderDetail, PointsEntry, User};
use crate::services::OrderService;
use crate::state::AppState;

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/profile.html")]
pub struct ProfileTemplate {
    pub page: PageContext,
    pub user: User,
    pub orders: Vec<Order>,
    pub ledger: Vec<PointsEntry>,
    /// Shareable registration link carrying the user's referral code.
    pub referral_link: String,
}

/// Order tracking page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/order_tracking.html")]
pub struct OrderTrackingTemplate {
    pub page: PageContext,
    pub detail: OrderDetail,
}

/// Display the caller's orders, points balance and ledger.
#[instrument(skip(state, page, current), fields(user_id = %current.id))]
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let mut conn = state.pool().acquire().await?;

    let user = UserRepository::new(&mut conn)
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("user".to_owned()))?;
    let orders = OrderService::new(&mut conn).history(user.id).await?;
    let ledger = PointsRepository::new(&mut conn).history(user.id).await?;

    let referral_link = format!(
        "{}/register?ref={}",
        state.config().base_url.trim_end_matches('/'),
        user.referral_code
    );

    Ok(ProfileTemplate {
        page,
        user,
        orders,
        ledger,
        referral_link,
    })
}

/// Display one of the caller's orders.
///
/// Someone else's order number is a 404, exactly like an unknown one.
#[instrument(skip(state, page, user), fields(user_id = %user.id))]
pub async fn order_tracking(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
    Path(order_number): Path<String>,
) -> Result<impl IntoResponse> {
    let mut conn = state.pool().acquire().await?;
    let detail = OrderService::new(&mut conn)
        .track(user.id, &order_number)
        .await?;

    Ok(OrderTrackingTemplate { page, detail })
}
