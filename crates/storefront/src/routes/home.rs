//! Home page: the product listing with its filter bar.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use tracing::instrument;

use marvo_core::Category;

use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::models::Product;
use crate::services::CatalogService;
use crate::services::catalog::ListingQuery;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub products: Vec<Product>,
    pub categories: [Category; 4],
    /// Filter values echoed back into the form.
    pub category: String,
    pub min_price: String,
    pub max_price: String,
    pub q: String,
    pub filtered: bool,
}

/// Display the product listing.
#[instrument(skip(state, page))]
pub async fn home(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse> {
    let filter = query.to_filter();
    let mut conn = state.pool().acquire().await?;
    let products = CatalogService::new(&mut conn).list(&filter).await?;

    Ok(HomeTemplate {
        page,
        products,
        categories: Category::ALL,
        category: filter.category.map(|c| c.as_str().to_owned()).unwrap_or_default(),
        min_price: query.min_price.unwrap_or_default(),
        max_price: query.max_price.unwrap_or_default(),
        q: query.q.unwrap_or_default(),
        filtered: !filter.is_empty(),
    })
}
