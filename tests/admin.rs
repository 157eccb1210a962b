mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{address, spawn_app};

#[tokio::test]
async fn test_user_listing_hides_passwords() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    app.register("listed").await;

    let users = app
        .client
        .get(app.url("/admin/users"))
        .headers(admin)
        .send()
        .await
        .expect("Failed to send list users request")
        .json::<Value>()
        .await
        .expect("Failed to parse users JSON");
    let users = users.as_array().expect("Users should be an array");

    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "listed");
    assert!(users.iter().all(|user| user.get("password").is_none()));
}

#[tokio::test]
async fn test_user_deletion_rules() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let apple = app.create_product("Apple", 1.0).await;
    let (_, idle_id) = app.register("idle").await;
    let (buyer, buyer_id) = app.register("buyer").await;

    app.client
        .post(app.url("/orders"))
        .headers(buyer)
        .json(&json!({
            "products": [{ "product": apple, "name": "Apple", "quantity": 1, "price": 1.0 }],
            "totalPrice": 1.0,
            "address": address()
        }))
        .send()
        .await
        .expect("Failed to send create order request");

    let blocked = app
        .client
        .delete(app.url(&format!("/admin/users/{buyer_id}")))
        .headers(admin.clone())
        .send()
        .await
        .expect("Failed to send delete user request");
    assert_eq!(blocked.status(), StatusCode::CONFLICT);

    let removed = app
        .client
        .delete(app.url(&format!("/admin/users/{idle_id}")))
        .headers(admin.clone())
        .send()
        .await
        .expect("Failed to send delete user request");
    assert_eq!(removed.status(), StatusCode::OK);

    let missing = app
        .client
        .delete(app.url(&format!("/admin/users/{idle_id}")))
        .headers(admin.clone())
        .send()
        .await
        .expect("Failed to send delete user request");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let profile = app
        .client
        .get(app.url("/auth/profile"))
        .headers(admin.clone())
        .send()
        .await
        .expect("Failed to send profile request")
        .json::<Value>()
        .await
        .expect("Failed to parse profile JSON");
    let admin_id = profile["id"].as_i64().expect("Admin id not found");

    let own = app
        .client
        .delete(app.url(&format!("/admin/users/{admin_id}")))
        .headers(admin)
        .send()
        .await
        .expect("Failed to send delete user request");
    assert_eq!(own.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleted_user_token_stops_working() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let (headers, id) = app.register("leaver").await;

    app.client
        .delete(app.url(&format!("/admin/users/{id}")))
        .headers(admin)
        .send()
        .await
        .expect("Failed to send delete user request");

    let response = app
        .client
        .get(app.url("/cart"))
        .headers(headers)
        .send()
        .await
        .expect("Failed to send cart request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_analytics_dashboard() {
    let app = spawn_app().await;
    let admin = app.admin().await;
    let apple = app.create_product("Apple", 4.0).await;
    let (buyer, _) = app.register("spender").await;

    let mut ids = Vec::new();
    for total in [4.0, 10.0] {
        let order = app
            .client
            .post(app.url("/orders"))
            .headers(buyer.clone())
            .json(&json!({
                "products": [{ "product": apple, "name": "Apple", "quantity": 1, "price": 4.0 }],
                "totalPrice": total,
                "address": address()
            }))
            .send()
            .await
            .expect("Failed to send create order request")
            .json::<Value>()
            .await
            .expect("Failed to parse order JSON");
        ids.push(order["id"].as_i64().expect("Order id not found"));
    }

    app.client
        .put(app.url(&format!("/orders/{}/cancel", ids[1])))
        .headers(buyer)
        .send()
        .await
        .expect("Failed to send cancel request");

    let stats = app
        .client
        .get(app.url("/admin/analytics"))
        .headers(admin)
        .send()
        .await
        .expect("Failed to send analytics request")
        .json::<Value>()
        .await
        .expect("Failed to parse analytics JSON");

    assert_eq!(stats["totalUsers"], 2);
    assert_eq!(stats["totalProducts"], 1);
    assert_eq!(stats["totalOrders"], 2);
    assert_eq!(stats["totalRevenue"], 4.0);
    assert_eq!(stats["ordersByStatus"]["pendingOrders"], 1);
    assert_eq!(stats["ordersByStatus"]["cancelledOrders"], 1);
}
