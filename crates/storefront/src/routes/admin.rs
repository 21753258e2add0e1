//! Admin panel route handlers.
//!
//! Every handler takes [`RequireAdmin`], which re-checks the admin flag in
//! the database on each request.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use marvo_core::{Category, OrderStatus, ProductId};

use crate::db;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::csrf::CSRF_FIELD;
use crate::middleware::{
    CsrfForm, CsrfOnly, CsrfProtected, Flash, PageContext, RequireAdmin, verify_csrf,
};
use crate::models::{Order, Product};
use crate::routes::flash_redirect;
use crate::services::products::{FieldErrors, ProductForm};
use crate::services::{ImageError, OrderError, OrderService, ProductAdminService};
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

/// Admin product list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products.html")]
pub struct AdminProductsTemplate {
    pub page: PageContext,
    pub products: Vec<Product>,
}

/// Add-product form template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/add_product.html")]
pub struct AddProductTemplate {
    pub page: PageContext,
    pub form: ProductForm,
    pub errors: FieldErrors,
    pub categories: [Category; 4],
}

impl AddProductTemplate {
    fn error_for(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }
}

/// Admin order list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders.html")]
pub struct AdminOrdersTemplate {
    pub page: PageContext,
    pub orders: Vec<Order>,
    pub statuses: [OrderStatus; 5],
    /// Selected status filter, empty for all.
    pub status_filter: String,
}

// =============================================================================
// Form Types
// =============================================================================

/// `?status=` on the order list.
#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
}

/// Status change form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub status: String,
}

impl CsrfProtected for StatusForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

/// An uploaded file from the add-product form.
struct Upload {
    file_name: String,
    data: Bytes,
}

/// Everything submitted with the add-product form.
#[derive(Default)]
struct ProductSubmission {
    csrf_token: String,
    form: ProductForm,
    image: Option<Upload>,
}

/// Read the multipart body into form fields and an optional image.
///
/// An empty file input (no name or no bytes) counts as no image.
async fn read_submission(multipart: &mut Multipart) -> Result<ProductSubmission> {
    let mut submission = ProductSubmission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == "image" {
            let file_name = field.file_name().unwrap_or_default().to_owned();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            if !file_name.is_empty() && !data.is_empty() {
                submission.image = Some(Upload { file_name, data });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let form = &mut submission.form;
        match name.as_str() {
            CSRF_FIELD => submission.csrf_token = value,
            "name" => form.name = value,
            "description" => form.description = value,
            "price" => form.price = value,
            "category" => form.category = value,
            "sizes" => form.sizes = value,
            "colors" => form.colors = value,
            "stock" => form.stock = value,
            _ => {}
        }
    }

    Ok(submission)
}

// =============================================================================
// Products
// =============================================================================

/// List every product.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn products(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let mut conn = state.pool().acquire().await?;
    let products = ProductAdminService::new(&mut conn, state.images())
        .list()
        .await?;
    Ok(AdminProductsTemplate { page, products })
}

/// Display the add-product form.
pub async fn add_product_page(
    RequireAdmin(_admin): RequireAdmin,
    page: PageContext,
) -> impl IntoResponse {
    AddProductTemplate {
        page,
        form: ProductForm::default(),
        errors: FieldErrors::new(),
        categories: Category::ALL,
    }
}

/// Create a product, storing its image first if one was uploaded.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn add_product(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    mut multipart: Multipart,
) -> Result<Response> {
    let submission = read_submission(&mut multipart).await?;
    if let Err(rejection) = verify_csrf(&session, &submission.csrf_token).await {
        return Ok(rejection.into_response());
    }

    let mut product = match submission.form.validate() {
        Ok(product) => product,
        Err(errors) => {
            return render_add_form(&session, &state, submission.form, errors).await;
        }
    };

    if let Some(upload) = submission.image {
        match state.images().save(&upload.file_name, upload.data).await {
            Ok(filename) => product.image_url = Some(filename),
            Err(e @ (ImageError::UnsupportedExtension | ImageError::InvalidImage)) => {
                tracing::info!(error = %e, file_name = %upload.file_name, "Rejected product image");
                let mut errors = FieldErrors::new();
                errors.insert("image", e.to_string());
                return render_add_form(&session, &state, submission.form, errors).await;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let mut tx = db::begin(state.pool()).await?;
    let created = ProductAdminService::new(&mut tx, state.images())
        .create(&product)
        .await?;
    tx.commit().await?;

    Ok(flash_redirect(
        &session,
        Flash::success(format!("Product \"{}\" added.", created.name)),
        "/admin",
    )
    .await?
    .into_response())
}

async fn render_add_form(
    session: &Session,
    state: &AppState,
    form: ProductForm,
    errors: FieldErrors,
) -> Result<Response> {
    let page = PageContext::load(session, state).await?;
    Ok(AddProductTemplate {
        page,
        form,
        errors,
        categories: Category::ALL,
    }
    .into_response())
}

/// Delete a product and its stored image.
#[instrument(skip(state, session, admin, _form), fields(admin_id = %admin.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    CsrfForm(_form): CsrfForm<CsrfOnly>,
) -> Result<Redirect> {
    let mut tx = db::begin(state.pool()).await?;
    let deleted = ProductAdminService::new(&mut tx, state.images())
        .delete(id)
        .await
        .map_err(|e| AppError::not_found_as(e, "product"))?;
    tx.commit().await?;

    flash_redirect(
        &session,
        Flash::success(format!("Product \"{}\" deleted.", deleted.name)),
        "/admin",
    )
    .await
}

// =============================================================================
// Orders
// =============================================================================

/// List every order, optionally filtered by status.
#[instrument(skip(state, admin, page), fields(admin_id = %admin.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    page: PageContext,
    Query(query): Query<OrdersQuery>,
) -> Result<impl IntoResponse> {
    let status = query
        .status
        .as_deref()
        .and_then(|s| s.parse::<OrderStatus>().ok());

    let mut conn = state.pool().acquire().await?;
    let orders = OrderService::new(&mut conn).list_all(status).await?;

    Ok(AdminOrdersTemplate {
        page,
        orders,
        statuses: OrderStatus::ALL,
        status_filter: status.map(|s| s.as_str().to_owned()).unwrap_or_default(),
    })
}

/// Move an order to its next status.
#[instrument(skip(state, session, admin, form), fields(admin_id = %admin.id, status = %form.status))]
pub async fn update_order_status(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(number): Path<String>,
    CsrfForm(form): CsrfForm<StatusForm>,
) -> Result<Redirect> {
    let Ok(next) = form.status.parse::<OrderStatus>() else {
        return flash_redirect(&session, Flash::error("Unknown order status."), "/admin/orders").await;
    };

    let mut tx = db::begin(state.pool()).await?;
    let result = OrderService::new(&mut tx).advance(&number, next).await;

    match result {
        Ok(order) => {
            tx.commit().await?;
            flash_redirect(
                &session,
                Flash::success(format!(
                    "Order {} is now {}.",
                    order.order_number,
                    order.status.label()
                )),
                "/admin/orders",
            )
            .await
        }
        Err(e @ OrderError::InvalidTransition { .. }) => {
            flash_redirect(&session, Flash::error(e.to_string()), "/admin/orders").await
        }
        Err(e) => Err(e.into()),
    }
}
