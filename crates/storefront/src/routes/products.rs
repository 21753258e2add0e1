//! Product detail and review route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use marvo_core::ProductId;

use crate::db;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CsrfForm, CsrfProtected, Flash, PageContext, RequireAuth};
use crate::models::{Product, Review};
use crate::routes::flash_redirect;
use crate::services::points::REVIEW_POINTS;
use crate::services::{CatalogService, ReviewError, ReviewService};
use crate::state::AppState;

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductTemplate {
    pub page: PageContext,
    pub product: Product,
    pub reviews: Vec<Review>,
    pub average_rating: Option<f64>,
    /// The signed-in user has not reviewed this product yet.
    pub can_review: bool,
}

/// Review form data.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub rating: String,
    pub comment: Option<String>,
}

impl CsrfProtected for ReviewForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

/// Display a product with its reviews.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let mut conn = state.pool().acquire().await?;
    let product_page = CatalogService::new(&mut conn)
        .product_page(id)
        .await
        .map_err(|e| AppError::not_found_as(e, "product"))?;

    let can_review = page.user().is_some_and(|user| {
        !product_page
            .reviews
            .iter()
            .any(|review| review.user_id == user.id)
    });

    Ok(ProductTemplate {
        page,
        product: product_page.product,
        reviews: product_page.reviews,
        average_rating: product_page.average_rating,
        can_review,
    })
}

/// Post a review. The first review of a product earns points.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn review(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    CsrfForm(form): CsrfForm<ReviewForm>,
) -> Result<Redirect> {
    let back = format!("/product/{id}");
    let Ok(rating) = form.rating.trim().parse::<i64>() else {
        return flash_redirect(&session, Flash::error(ReviewError::InvalidRating.to_string()), &back).await;
    };

    let mut tx = db::begin(state.pool()).await?;
    let result = ReviewService::new(&mut tx)
        .post(user.id, id, rating, form.comment.as_deref())
        .await;

    match result {
        Ok(review_id) => {
            tx.commit().await?;
            add_breadcrumb("review", "Posted review", Some(&[("product_id", &id.to_string())]));
            tracing::info!(review_id = %review_id, "Review posted");
            flash_redirect(
                &session,
                Flash::success(format!(
                    "Thanks for your review! You earned {REVIEW_POINTS} points."
                )),
                &back,
            )
            .await
        }
        Err(e @ (ReviewError::InvalidRating | ReviewError::AlreadyReviewed)) => {
            flash_redirect(&session, Flash::error(e.to_string()), &back).await
        }
        Err(e) => Err(e.into()),
    }
}
