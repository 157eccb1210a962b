#![allow(dead_code)]

use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};
use storefront::config::AppConfig;

pub const ADMIN_EMAIL: &str = "admin@grocery.com";
pub const ADMIN_PASSWORD: &str = "admin123";

pub struct TestApp {
    pub base: String,
    pub client: Client,
}

/// Boots the service on an ephemeral port against a fresh in-memory store.
pub async fn spawn_app() -> TestApp {
    let config = AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: "integration-test-secret".into(),
        bind_addr: "127.0.0.1:0".parse().expect("Failed to parse bind address"),
        token_ttl_hours: 1,
        db_max_connections: 1,
        admin_email: ADMIN_EMAIL.into(),
        admin_password: ADMIN_PASSWORD.into(),
        seed_demo_data: false,
    };

    let db = storefront::init_database(&config)
        .await
        .expect("Failed to initialise database");
    let app = storefront::create_app(db, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server crashed");
    });

    TestApp {
        base: format!("http://{addr}/api"),
        client: Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn login(&self, email: &str, password: &str) -> header::HeaderMap {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to send login request");
        assert_eq!(response.status(), StatusCode::OK);

        let body = response
            .json::<Value>()
            .await
            .expect("Failed to parse login response JSON");
        bearer(body["token"].as_str().expect("Token not found in login response"))
    }

    pub async fn admin(&self) -> header::HeaderMap {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Registers `username` and returns its auth headers and user id.
    pub async fn register(&self, username: &str) -> (header::HeaderMap, i64) {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "firstname": "Test",
                "lastname": "Shopper",
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "password123"
            }))
            .send()
            .await
            .expect("Failed to send register request");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response
            .json::<Value>()
            .await
            .expect("Failed to parse register response JSON");
        let id = body["id"].as_i64().expect("User id not found in response");
        (
            bearer(body["token"].as_str().expect("Token not found in response")),
            id,
        )
    }

    /// Creates a product through the admin API and returns its id.
    pub async fn create_product(&self, name: &str, price: f64) -> i64 {
        let admin = self.admin().await;
        let response = self
            .client
            .post(self.url("/admin/products"))
            .headers(admin)
            .json(&json!({
                "name": name,
                "description": format!("Fresh {name}"),
                "price": price,
                "image": format!("/img/{name}.jpg"),
                "countInStock": 20
            }))
            .send()
            .await
            .expect("Failed to send create product request");
        assert_eq!(response.status(), StatusCode::CREATED);

        response
            .json::<Value>()
            .await
            .expect("Failed to parse product response JSON")["id"]
            .as_i64()
            .expect("Product id not found in response")
    }
}

pub fn bearer(token: &str) -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token))
            .expect("Failed to create Authorization header"),
    );
    headers
}

pub fn address() -> Value {
    json!({
        "street": "12 Baker Street",
        "city": "London",
        "state": "LDN",
        "zipCode": "NW1 6XE",
        "phone": "+44 20 7946 0000"
    })
}
