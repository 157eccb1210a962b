//! Per-user cart store. Lines reference products by id only; prices and
//! names are resolved from the live catalog whenever the cart is read.

use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};
use serde::Serialize;
use tracing::debug;

use crate::entities::{cart, cart::Entity as CartEntity, product};
use crate::error::ApiError;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: i32,
    pub name: String,
    pub price: f64,
    pub image: String,
    pub count_in_stock: i32,
}

impl From<product::Model> for ProductSummary {
    fn from(value: product::Model) -> Self {
        Self {
            id: value.id,
            name: value.name,
            price: value.price,
            image: value.image,
            count_in_stock: value.count_in_stock,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub product: Option<ProductSummary>,
}

impl CartLineView {
    fn new(line: cart::Model, product: Option<product::Model>) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            quantity: line.quantity,
            product: product.map(ProductSummary::from),
        }
    }
}

pub async fn list(db: &DatabaseConnection, owner: i32) -> Result<Vec<CartLineView>, ApiError> {
    let lines = CartEntity::find()
        .filter(cart::Column::UserId.eq(owner))
        .order_by_asc(cart::Column::Id)
        .find_also_related(product::Entity)
        .all(db)
        .await?;

    Ok(lines
        .into_iter()
        .map(|(line, product)| CartLineView::new(line, product))
        .collect())
}

/// Upper bound for the quantity held by a single cart line.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// Adds `quantity` of a product, merging into the existing line when there
/// is one. The merge is a single `INSERT .. ON CONFLICT DO UPDATE` issued
/// before any read, so the transaction holds the write lock from its first
/// statement and concurrent adds cannot lose increments. A merge that would
/// push the line past [`MAX_LINE_QUANTITY`] is refused and leaves the line
/// untouched. Returns the line and whether it was newly created.
pub async fn add(
    db: &DatabaseConnection,
    owner: i32,
    product_id: i32,
    quantity: i32,
) -> Result<(CartLineView, bool), ApiError> {
    check_quantity(quantity)?;

    let txn = db.begin().await?;

    let new_line = cart::ActiveModel {
        user_id: Set(owner),
        product_id: Set(product_id),
        quantity: Set(quantity),
        ..Default::default()
    };
    let written = CartEntity::insert(new_line)
        .on_conflict(
            OnConflict::columns([cart::Column::UserId, cart::Column::ProductId])
                .value(
                    cart::Column::Quantity,
                    Expr::col((CartEntity, cart::Column::Quantity)).add(quantity),
                )
                .action_and_where(
                    Expr::col((CartEntity, cart::Column::Quantity))
                        .lte(MAX_LINE_QUANTITY - quantity),
                )
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => product_not_found(product_id),
            _ => ApiError::Store(err),
        })?;

    if written == 0 {
        return Err(quantity_too_large());
    }

    // Dropping the transaction on this path rolls the upsert back.
    let product = product::Entity::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or_else(|| product_not_found(product_id))?;

    let line = find_line(&txn, owner, product_id)
        .await?
        .ok_or_else(|| ApiError::Internal("Cart line vanished after upsert".into()))?;

    txn.commit().await?;

    // Stored quantities are at least 1, so a merged line always ends above
    // the quantity that was just added.
    let created = line.quantity == quantity;
    debug!(owner, product_id, quantity = line.quantity, merged = !created, "Cart line saved");

    Ok((CartLineView::new(line, Some(product)), created))
}

pub async fn set_quantity(
    db: &DatabaseConnection,
    owner: i32,
    line_id: i32,
    quantity: i32,
) -> Result<CartLineView, ApiError> {
    check_quantity(quantity)?;

    let txn = db.begin().await?;

    let result = CartEntity::update_many()
        .col_expr(cart::Column::Quantity, Expr::value(quantity))
        .filter(cart::Column::Id.eq(line_id))
        .filter(cart::Column::UserId.eq(owner))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Cart item not found".into()));
    }

    let (line, product) = CartEntity::find_by_id(line_id)
        .find_also_related(product::Entity)
        .one(&txn)
        .await?
        .ok_or_else(|| ApiError::Internal("Cart line vanished after update".into()))?;
    txn.commit().await?;

    Ok(CartLineView::new(line, product))
}

pub async fn remove(db: &DatabaseConnection, owner: i32, line_id: i32) -> Result<(), ApiError> {
    let result = CartEntity::delete_many()
        .filter(cart::Column::Id.eq(line_id))
        .filter(cart::Column::UserId.eq(owner))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Cart item not found".into()));
    }
    Ok(())
}

/// Deletes every line of `owner`. Clearing an empty cart is not an error.
pub async fn clear<C: ConnectionTrait>(db: &C, owner: i32) -> Result<u64, ApiError> {
    let result = CartEntity::delete_many()
        .filter(cart::Column::UserId.eq(owner))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

async fn find_line<C: ConnectionTrait>(
    db: &C,
    owner: i32,
    product_id: i32,
) -> Result<Option<cart::Model>, ApiError> {
    Ok(CartEntity::find()
        .filter(cart::Column::UserId.eq(owner))
        .filter(cart::Column::ProductId.eq(product_id))
        .one(db)
        .await?)
}

fn check_quantity(quantity: i32) -> Result<(), ApiError> {
    if quantity < 1 {
        return Err(ApiError::Validation("Quantity must be at least 1".into()));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(quantity_too_large());
    }
    Ok(())
}

fn quantity_too_large() -> ApiError {
    ApiError::Validation(format!(
        "A cart line cannot hold more than {} items",
        MAX_LINE_QUANTITY
    ))
}

fn product_not_found(product_id: i32) -> ApiError {
    ApiError::NotFound(format!("No product with {} id was found", product_id))
}
