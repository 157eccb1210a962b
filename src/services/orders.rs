//! Order engine: turns a checkout snapshot into an immutable order and
//! drives its status through the transition table in [`super::lifecycle`].

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, LoaderTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

use crate::entities::{
    order::{self, Entity as OrderEntity, Status},
    order_item, user,
};
use crate::error::ApiError;
use crate::middleware::auth::Claims;
use crate::services::{
    cart,
    lifecycle::{self, Action, Effect},
};

pub const DEFAULT_PAYMENT_METHOD: &str = "COD";

/// Tolerance when comparing a client total against the line subtotal.
const PRICE_EPSILON: f64 = 0.005;

const TRANSITION_ATTEMPTS: usize = 3;

#[derive(Deserialize, Serialize, Validate, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    #[serde(alias = "productId")]
    pub product: i32,
    #[validate(length(min = 1, message = "Line item name is required"))]
    pub name: String,
    #[validate(range(min = 1, message = "Line item quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(range(min = 0.0, message = "Line item price cannot be negative"))]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Validate, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip_code: String,
    #[validate(regex(path = *crate::services::PHONE_RE, message = "Phone number is invalid"))]
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub line_items: Vec<LineItemInput>,
    pub total_price: f64,
    pub address: Address,
    pub payment_method: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

impl From<user::Model> for OwnerSummary {
    fn from(value: user::Model) -> Self {
        Self {
            id: value.id,
            firstname: value.firstname,
            lastname: value.lastname,
            email: value.email,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: i32,
    pub user: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerSummary>,
    pub products: Vec<LineItemInput>,
    pub total_price: f64,
    pub status: Status,
    pub address: Address,
    pub payment_method: String,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    fn new(
        order: order::Model,
        mut items: Vec<order_item::Model>,
        owner: Option<user::Model>,
    ) -> Self {
        items.sort_by_key(|item| item.position);
        Self {
            id: order.id,
            user: order.user_id,
            owner: owner.map(OwnerSummary::from),
            products: items
                .into_iter()
                .map(|item| LineItemInput {
                    product: item.product_id,
                    name: item.name,
                    quantity: item.quantity,
                    price: item.price,
                    image: item.image,
                })
                .collect(),
            total_price: order.total_price,
            status: order.status,
            address: Address {
                street: order.street,
                city: order.city,
                state: order.state,
                zip_code: order.zip_code,
                phone: order.phone,
            },
            payment_method: order.payment_method,
            is_paid: order.is_paid,
            paid_at: order.paid_at,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

fn validate_new_order(input: &NewOrder) -> Result<(), ApiError> {
    if input.line_items.is_empty() {
        return Err(ApiError::Validation("No order items".into()));
    }
    for item in &input.line_items {
        item.validate()?;
    }
    input.address.validate()?;

    if !input.total_price.is_finite() || input.total_price < 0.0 {
        return Err(ApiError::Validation("Total price is invalid".into()));
    }
    let subtotal: f64 = input
        .line_items
        .iter()
        .map(|item| item.price * f64::from(item.quantity))
        .sum();
    if input.total_price + PRICE_EPSILON < subtotal {
        return Err(ApiError::Validation(format!(
            "Total price {:.2} is below the item subtotal {:.2}",
            input.total_price, subtotal
        )));
    }
    Ok(())
}

/// Persists the order and its line snapshot, then clears the owner's cart,
/// all inside one transaction: either every step lands or none does.
pub async fn create(
    db: &DatabaseConnection,
    owner: i32,
    input: NewOrder,
) -> Result<OrderView, ApiError> {
    validate_new_order(&input)?;

    let payment_method = input
        .payment_method
        .map(|method| method.trim().to_owned())
        .filter(|method| !method.is_empty())
        .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_owned());
    let now = Utc::now();

    let txn = db.begin().await?;

    let order = order::ActiveModel {
        user_id: Set(owner),
        total_price: Set(input.total_price),
        status: Set(Status::Pending),
        street: Set(input.address.street),
        city: Set(input.address.city),
        state: Set(input.address.state),
        zip_code: Set(input.address.zip_code),
        phone: Set(input.address.phone),
        payment_method: Set(payment_method),
        is_paid: Set(false),
        paid_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let items = input
        .line_items
        .into_iter()
        .enumerate()
        .map(|(position, item)| order_item::ActiveModel {
            order_id: Set(order.id),
            position: Set(position as i32),
            product_id: Set(item.product),
            name: Set(item.name),
            quantity: Set(item.quantity),
            price: Set(item.price),
            image: Set(item.image),
            ..Default::default()
        });
    order_item::Entity::insert_many(items)
        .exec_without_returning(&txn)
        .await?;

    let cleared = cart::clear(&txn, owner).await?;

    let view = load_view(&txn, order, false).await?;
    txn.commit().await?;

    info!(
        order_id = view.id,
        owner,
        lines = view.products.len(),
        total = view.total_price,
        cart_lines_cleared = cleared,
        "Order created"
    );
    Ok(view)
}

/// Orders of `owner`, newest first.
pub async fn list_for_owner(
    db: &DatabaseConnection,
    owner: i32,
) -> Result<Vec<OrderView>, ApiError> {
    let orders = OrderEntity::find()
        .filter(order::Column::UserId.eq(owner))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await?;
    load_views(db, orders, false).await
}

/// All orders with their owners resolved, newest first.
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<OrderView>, ApiError> {
    let orders = OrderEntity::find()
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .all(db)
        .await?;
    load_views(db, orders, true).await
}

/// Single order read. Non-admins only see their own orders; anything else is
/// reported as missing, so foreign order ids look the same as unused ones.
pub async fn get(db: &DatabaseConnection, id: i32, requester: &Claims) -> Result<OrderView, ApiError> {
    let order = find_visible(db, id, requester).await?;
    load_view(db, order, true).await
}

/// Admin status change, checked against the transition table.
pub async fn set_status(
    db: &DatabaseConnection,
    id: i32,
    status: Status,
) -> Result<OrderView, ApiError> {
    transition(db, id, None, Action::SetStatus(status)).await
}

/// Owner-initiated cancellation. Rejected once the order is delivered;
/// cancelling an already cancelled order is a no-op.
pub async fn cancel(db: &DatabaseConnection, id: i32, requester: &Claims) -> Result<OrderView, ApiError> {
    transition(db, id, Some(requester), Action::Cancel).await
}

/// Applies `action` with a compare-and-set on the stored status. When another
/// writer moves the order between the read and the write, the update matches
/// no row and the step is recomputed from the fresh status.
async fn transition(
    db: &DatabaseConnection,
    id: i32,
    requester: Option<&Claims>,
    action: Action,
) -> Result<OrderView, ApiError> {
    for _ in 0..TRANSITION_ATTEMPTS {
        let order = match requester {
            Some(requester) => find_visible(db, id, requester).await?,
            None => OrderEntity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(order_not_found)?,
        };

        let step = lifecycle::apply(order.status, action).map_err(|rejected| {
            ApiError::InvalidTransition {
                from: rejected.from,
                to: rejected.to,
            }
        })?;

        if step.is_noop() {
            return load_view(db, order, true).await;
        }

        let now = Utc::now();
        let mut update = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(step.to))
            .col_expr(order::Column::UpdatedAt, Expr::value(now));
        if step.effect == Effect::MarkPaid {
            update = update
                .col_expr(order::Column::IsPaid, Expr::value(true))
                .col_expr(order::Column::PaidAt, Expr::value(Some(now)));
        }
        let result = update
            .filter(order::Column::Id.eq(id))
            .filter(order::Column::Status.eq(step.from))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            debug!(order_id = id, from = %step.from, "Order status moved underneath, retrying");
            continue;
        }

        let updated = OrderEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(order_not_found)?;
        info!(
            order_id = updated.id,
            from = %step.from,
            to = %step.to,
            paid = updated.is_paid,
            "Order status changed"
        );
        return load_view(db, updated, true).await;
    }

    Err(ApiError::Conflict(
        "Order is being updated by another request, try again".into(),
    ))
}

async fn find_visible<C: ConnectionTrait>(
    db: &C,
    id: i32,
    requester: &Claims,
) -> Result<order::Model, ApiError> {
    let order = OrderEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(order_not_found)?;

    if order.user_id != requester.user_id && !requester.is_admin() {
        return Err(order_not_found());
    }
    Ok(order)
}

fn order_not_found() -> ApiError {
    ApiError::NotFound("Order not found".into())
}

async fn load_view<C: ConnectionTrait>(
    db: &C,
    order: order::Model,
    with_owner: bool,
) -> Result<OrderView, ApiError> {
    let mut views = load_views(db, vec![order], with_owner).await?;
    views
        .pop()
        .ok_or_else(|| ApiError::Internal("Order view could not be built".into()))
}

async fn load_views<C: ConnectionTrait>(
    db: &C,
    orders: Vec<order::Model>,
    with_owner: bool,
) -> Result<Vec<OrderView>, ApiError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let items = orders.load_many(order_item::Entity, db).await?;
    let owners = if with_owner {
        orders.load_one(user::Entity, db).await?
    } else {
        vec![None; orders.len()]
    };

    Ok(orders
        .into_iter()
        .zip(items)
        .zip(owners)
        .map(|((order, items), owner)| OrderView::new(order, items, owner))
        .collect())
}
