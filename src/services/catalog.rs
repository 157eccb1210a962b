//! Categories, products and reviews.

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    LoaderTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::entities::{
    cart,
    category::{self, Entity as CategoryEntity},
    product::{self, Entity as ProductEntity},
    review::{self, Entity as ReviewEntity},
    user,
};
use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: u64 = 12;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 64, message = "Category name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Deserialize, Validate, Debug, Clone, Default)]
pub struct CategoryUpdate {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(Deserialize, Validate, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(length(min = 1, max = 128, message = "Product name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[serde(default)]
    pub image: String,
    #[serde(alias = "categoryId")]
    pub category: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub count_in_stock: i32,
}

#[derive(Deserialize, Validate, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    pub image: Option<String>,
    #[serde(alias = "categoryId")]
    pub category: Option<i32>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub count_in_stock: Option<i32>,
}

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct NewReview {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub comment: String,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    PriceAsc,
    PriceDesc,
    Rating,
    #[default]
    Newest,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProductQuery {
    pub category: Option<i32>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    pub id: i32,
    pub name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image: String,
    pub category: Option<CategoryRef>,
    pub count_in_stock: i32,
    pub rating: f64,
    pub num_reviews: i32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<review::Model>>,
}

impl ProductView {
    fn new(value: product::Model, category: Option<category::Model>) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            price: value.price,
            image: value.image,
            category: category.map(|c| CategoryRef {
                id: c.id,
                name: c.name,
            }),
            count_in_stock: value.count_in_stock,
            rating: value.rating,
            num_reviews: value.num_reviews,
            created_at: value.created_at,
            reviews: None,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<ProductView>,
    pub page: u64,
    pub pages: u64,
    pub total: u64,
}

// Categories

pub async fn list_categories(db: &DatabaseConnection) -> Result<Vec<category::Model>, ApiError> {
    Ok(CategoryEntity::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?)
}

pub async fn get_category(db: &DatabaseConnection, id: i32) -> Result<category::Model, ApiError> {
    find_category(db, id).await
}

pub async fn create_category(
    db: &DatabaseConnection,
    input: NewCategory,
) -> Result<category::Model, ApiError> {
    ensure_category_name_free(db, &input.name, None).await?;

    let created = category::ActiveModel {
        name: Set(input.name),
        description: Set(input.description),
        image: Set(input.image),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| ApiError::conflict_on_constraint(err, "Category already exists"))?;

    info!(category_id = created.id, "Category created");
    Ok(created)
}

pub async fn update_category(
    db: &DatabaseConnection,
    id: i32,
    input: CategoryUpdate,
) -> Result<category::Model, ApiError> {
    let current = find_category(db, id).await?;

    let mut active: category::ActiveModel = current.into();
    if let Some(name) = input.name {
        ensure_category_name_free(db, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(description) = input.description {
        active.description = Set(description);
    }
    if let Some(image) = input.image {
        active.image = Set(image);
    }

    let updated = active
        .update(db)
        .await
        .map_err(|err| ApiError::conflict_on_constraint(err, "Category already exists"))?;
    Ok(updated)
}

/// Products of a removed category stay in the catalog uncategorised.
pub async fn delete_category(db: &DatabaseConnection, id: i32) -> Result<(), ApiError> {
    let txn = db.begin().await?;
    ProductEntity::update_many()
        .col_expr(product::Column::CategoryId, Expr::value(Option::<i32>::None))
        .filter(product::Column::CategoryId.eq(id))
        .exec(&txn)
        .await?;
    let result = CategoryEntity::delete_by_id(id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Category not found".into()));
    }
    txn.commit().await?;

    info!(category_id = id, "Category removed");
    Ok(())
}

async fn find_category<C: ConnectionTrait>(db: &C, id: i32) -> Result<category::Model, ApiError> {
    CategoryEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Category not found".into()))
}

async fn ensure_category_name_free<C: ConnectionTrait>(
    db: &C,
    name: &str,
    except: Option<i32>,
) -> Result<(), ApiError> {
    let mut query = CategoryEntity::find().filter(category::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(category::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ApiError::Conflict("Category already exists".into()));
    }
    Ok(())
}

// Products

pub async fn search_products(
    db: &DatabaseConnection,
    params: ProductQuery,
) -> Result<ProductPage, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let page = params.page.unwrap_or(1).max(1);

    let mut query = ProductEntity::find();
    if let Some(category_id) = params.category {
        query = query.filter(product::Column::CategoryId.eq(category_id));
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        query = query.filter(
            Expr::expr(Func::lower(Expr::col((
                ProductEntity,
                product::Column::Name,
            ))))
            .like(pattern),
        );
    }
    query = match params.sort {
        SortOrder::PriceAsc => query.order_by_asc(product::Column::Price),
        SortOrder::PriceDesc => query.order_by_desc(product::Column::Price),
        SortOrder::Rating => query.order_by_desc(product::Column::Rating),
        SortOrder::Newest => query.order_by_desc(product::Column::CreatedAt),
    }
    .order_by_desc(product::Column::Id);

    let paginator = query.paginate(db, limit);
    let counts = paginator.num_items_and_pages().await?;
    let products = paginator.fetch_page(page - 1).await?;
    let categories = products.load_one(CategoryEntity, db).await?;

    Ok(ProductPage {
        products: products
            .into_iter()
            .zip(categories)
            .map(|(product, category)| ProductView::new(product, category))
            .collect(),
        page,
        pages: counts.number_of_pages,
        total: counts.number_of_items,
    })
}

/// A single product with its category and every review, newest first.
pub async fn get_product(db: &DatabaseConnection, id: i32) -> Result<ProductView, ApiError> {
    let (product, category) = ProductEntity::find_by_id(id)
        .find_also_related(CategoryEntity)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;

    let reviews = ReviewEntity::find()
        .filter(review::Column::ProductId.eq(id))
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .all(db)
        .await?;

    let mut view = ProductView::new(product, category);
    view.reviews = Some(reviews);
    Ok(view)
}

pub async fn create_product(
    db: &DatabaseConnection,
    input: NewProduct,
) -> Result<ProductView, ApiError> {
    let category = match input.category {
        Some(id) => Some(existing_category(db, id).await?),
        None => None,
    };

    let created = product::ActiveModel {
        name: Set(input.name),
        description: Set(input.description),
        price: Set(input.price),
        image: Set(input.image),
        category_id: Set(input.category),
        count_in_stock: Set(input.count_in_stock),
        rating: Set(0.0),
        num_reviews: Set(0),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(product_id = created.id, "Product created");
    Ok(ProductView::new(created, category))
}

pub async fn update_product(
    db: &DatabaseConnection,
    id: i32,
    input: ProductUpdate,
) -> Result<ProductView, ApiError> {
    let current = ProductEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;

    let mut active: product::ActiveModel = current.into();
    if let Some(name) = input.name {
        active.name = Set(name);
    }
    if let Some(description) = input.description {
        active.description = Set(description);
    }
    if let Some(price) = input.price {
        active.price = Set(price);
    }
    if let Some(image) = input.image {
        active.image = Set(image);
    }
    if let Some(category_id) = input.category {
        existing_category(db, category_id).await?;
        active.category_id = Set(Some(category_id));
    }
    if let Some(count) = input.count_in_stock {
        active.count_in_stock = Set(count);
    }

    let updated = active.update(db).await?;
    let category = match updated.category_id {
        Some(category_id) => CategoryEntity::find_by_id(category_id).one(db).await?,
        None => None,
    };
    Ok(ProductView::new(updated, category))
}

/// Removes a product together with the cart lines that point at it. Order
/// line snapshots carry their own copy and are left alone.
pub async fn delete_product(db: &DatabaseConnection, id: i32) -> Result<(), ApiError> {
    let txn = db.begin().await?;
    cart::Entity::delete_many()
        .filter(cart::Column::ProductId.eq(id))
        .exec(&txn)
        .await?;
    let result = ProductEntity::delete_by_id(id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Product not found".into()));
    }
    txn.commit().await?;

    info!(product_id = id, "Product removed");
    Ok(())
}

async fn existing_category<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<category::Model, ApiError> {
    CategoryEntity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::Validation(format!("No category with {id} id was found")))
}

// Reviews

/// Records one review per user and product, then recomputes the product's
/// `rating` mean and `num_reviews` inside the same transaction. The insert
/// is the transaction's first statement; the unique index on
/// (product, user) rejects a second review.
pub async fn add_review(
    db: &DatabaseConnection,
    reviewer: i32,
    product_id: i32,
    input: NewReview,
) -> Result<review::Model, ApiError> {
    let product_missing = || ApiError::NotFound("Product not found".into());

    let author = user::Entity::find_by_id(reviewer)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, token failed".into()))?;

    let txn = db.begin().await?;

    let created = review::ActiveModel {
        product_id: Set(product_id),
        user_id: Set(reviewer),
        name: Set(format!("{} {}", author.firstname, author.lastname)),
        rating: Set(input.rating),
        comment: Set(input.comment),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ApiError::Conflict("Product already reviewed".into())
        }
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => product_missing(),
        _ => ApiError::Store(err),
    })?;

    let ratings: Vec<i32> = ReviewEntity::find()
        .filter(review::Column::ProductId.eq(product_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();
    let count = ratings.len() as i32;
    let mean = ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / f64::from(count.max(1));

    let result = ProductEntity::update_many()
        .col_expr(product::Column::Rating, Expr::value(mean))
        .col_expr(product::Column::NumReviews, Expr::value(count))
        .filter(product::Column::Id.eq(product_id))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(product_missing());
    }
    txn.commit().await?;

    info!(product_id, reviewer, rating = input.rating, "Review added");
    Ok(created)
}
