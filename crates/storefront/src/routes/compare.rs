//! Product comparison route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use tower_sessions::Session;
use tracing::instrument;

use marvo_core::ProductId;

use crate::db;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CsrfForm, CsrfOnly, Flash, PageContext, RequireAuth};
use crate::models::Product;
use crate::routes::flash_redirect;
use crate::services::CompareService;
use crate::state::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "compare.html")]
pub struct CompareTemplate {
    pub page: PageContext,
    pub products: Vec<Product>,
}

/// Show the caller's comparison list side by side.
#[instrument(skip(state, user, page), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let mut conn = state.pool().acquire().await?;
    let products = CompareService::new(&mut conn).list(user.id).await?;
    Ok(CompareTemplate { page, products })
}

#[instrument(skip(state, session, user, _form), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    CsrfForm(_form): CsrfForm<CsrfOnly>,
) -> Result<Redirect> {
    let mut tx = db::begin(state.pool()).await?;
    let product = CompareService::new(&mut tx)
        .add(user.id, product_id)
        .await
        .map_err(|e| AppError::not_found_as(e, "product"))?;
    tx.commit().await?;

    flash_redirect(
        &session,
        Flash::success(format!("{} added to your comparison.", product.name)),
        "/compare",
    )
    .await
}

#[instrument(skip(state, session, user, _form), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
    CsrfForm(_form): CsrfForm<CsrfOnly>,
) -> Result<Redirect> {
    let mut tx = db::begin(state.pool()).await?;
    let removed = CompareService::new(&mut tx)
        .remove(user.id, product_id)
        .await?;
    tx.commit().await?;

    if removed {
        flash_redirect(&session, Flash::info("Removed from your comparison."), "/compare").await
    } else {
        Ok(Redirect::to("/compare"))
    }
}
