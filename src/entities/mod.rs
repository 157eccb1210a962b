pub mod user;
pub mod product;
pub mod review;
pub mod cart;
pub mod category;
pub mod order;
pub mod order_item;

use chrono::Utc;
use sea_orm::{
    sea_query::Index, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, Schema, Set, TransactionTrait,
};
use tracing::info;

use crate::config::AppConfig;
use crate::entities::{
    cart::Entity as Cart,
    category::Entity as Category,
    order::Entity as Order,
    order_item::Entity as OrderItem,
    product::Entity as Product,
    review::Entity as Review,
    user::Entity as User,
};
use crate::services::accounts::{hash_password, normalize_email};
use crate::StartupError;

pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut tables = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Category),
        schema.create_table_from_entity(Product),
        schema.create_table_from_entity(Review),
        schema.create_table_from_entity(Cart),
        schema.create_table_from_entity(Order),
        schema.create_table_from_entity(OrderItem),
    ];
    for table in tables.iter_mut() {
        table.if_not_exists();
        db.execute(backend.build(&*table)).await?;
    }

    // Backs the atomic merge-on-add upsert in the cart store.
    let cart_line_unique = Index::create()
        .if_not_exists()
        .name("idx_cart_user_product")
        .table(Cart)
        .col(cart::Column::UserId)
        .col(cart::Column::ProductId)
        .unique()
        .to_owned();
    db.execute(backend.build(&cart_line_unique)).await?;

    let one_review_per_user = Index::create()
        .if_not_exists()
        .name("idx_review_product_user")
        .table(Review)
        .col(review::Column::ProductId)
        .col(review::Column::UserId)
        .unique()
        .to_owned();
    db.execute(backend.build(&one_review_per_user)).await?;

    Ok(())
}

/// Seeds the administrator account and, when enabled, the demo catalog.
/// Both steps are skipped when their data already exists.
pub async fn primary_setup(db: &DatabaseConnection, config: &AppConfig) -> Result<(), StartupError> {
    let admin_email = normalize_email(&config.admin_email);
    let admin_exists = User::find()
        .filter(user::Column::Email.eq(admin_email.as_str()))
        .one(db)
        .await?
        .is_some();

    if !admin_exists {
        let password = hash_password(&config.admin_password)
            .map_err(|err| StartupError::Seed(err.to_string()))?;
        user::ActiveModel {
            firstname: Set("Admin".to_owned()),
            lastname: Set("User".to_owned()),
            username: Set("admin".to_owned()),
            email: Set(admin_email.clone()),
            password: Set(password),
            role: Set(user::Role::Admin),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        info!(email = %admin_email, "Seeded administrator account");
    }

    if config.seed_demo_data && Category::find().count(db).await? == 0 {
        seed_demo_catalog(db).await?;
    }

    Ok(())
}

const DEMO_CATALOG: &[(&str, &str, &[(&str, &str, f64, i32)])] = &[
    (
        "Fruits & Vegetables",
        "Fresh fruits and vegetables",
        &[
            ("Fresh Bananas", "Ripe yellow bananas, perfect for smoothies and snacking.", 2.49, 150),
            ("Organic Apples", "Crisp and sweet organic Fuji apples.", 3.99, 200),
        ],
    ),
    (
        "Dairy & Eggs",
        "Milk, cheese, eggs and dairy products",
        &[
            ("Whole Milk", "Farm-fresh whole milk. 1 gallon.", 4.49, 60),
            ("Free Range Eggs", "One dozen large free-range eggs.", 5.99, 90),
        ],
    ),
    (
        "Bakery",
        "Fresh bread, cakes and pastries",
        &[
            ("Sourdough Bread", "Artisan sourdough bread baked fresh daily.", 5.49, 30),
            ("Blueberry Muffins", "Moist blueberry muffins. Pack of 4.", 4.49, 20),
        ],
    ),
    (
        "Beverages",
        "Juices, soft drinks, tea and coffee",
        &[
            ("Fresh Orange Juice", "100% fresh-squeezed orange juice. 1 liter bottle.", 6.99, 40),
            ("Cold Brew Coffee", "Smooth cold brew coffee concentrate.", 8.99, 30),
        ],
    ),
    (
        "Snacks",
        "Chips, cookies, nuts and snacks",
        &[
            ("Mixed Nuts", "Roasted mixed nuts, lightly salted. 500g pack.", 8.99, 55),
            ("Dark Chocolate Bar", "72% cacao dark chocolate.", 4.99, 65),
        ],
    ),
];

async fn seed_demo_catalog(db: &DatabaseConnection) -> Result<(), StartupError> {
    let password =
        hash_password("password123").map_err(|err| StartupError::Seed(err.to_string()))?;

    let txn = db.begin().await?;

    let demo_user_exists = User::find()
        .filter(user::Column::Username.eq("johndoe"))
        .one(&txn)
        .await?
        .is_some();
    if !demo_user_exists {
        user::ActiveModel {
            firstname: Set("John".to_owned()),
            lastname: Set("Doe".to_owned()),
            username: Set("johndoe".to_owned()),
            email: Set("john@example.com".to_owned()),
            password: Set(password),
            role: Set(user::Role::User),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    let mut product_count = 0;
    for (name, description, products) in DEMO_CATALOG {
        let created = category::ActiveModel {
            name: Set((*name).to_owned()),
            description: Set((*description).to_owned()),
            image: Set(String::new()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for (product_name, product_description, price, stock) in products.iter() {
            product::ActiveModel {
                name: Set((*product_name).to_owned()),
                description: Set((*product_description).to_owned()),
                price: Set(*price),
                image: Set(String::new()),
                category_id: Set(Some(created.id)),
                count_in_stock: Set(*stock),
                rating: Set(0.0),
                num_reviews: Set(0),
                created_at: Set(Utc::now()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            product_count += 1;
        }
    }

    txn.commit().await?;
    info!(
        categories = DEMO_CATALOG.len(),
        products = product_count,
        "Seeded demo catalog"
    );
    Ok(())
}
