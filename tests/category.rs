mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::spawn_app;

#[tokio::test]
async fn test_category_crud() {
    let app = spawn_app().await;
    let admin = app.admin().await;

    let created = app
        .client
        .post(app.url("/admin/categories"))
        .headers(admin.clone())
        .json(&json!({
            "name": "Vegetables",
            "description": "Green things",
            "image": "/img/veg.jpg"
        }))
        .send()
        .await
        .expect("Failed to send create category request");
    assert_eq!(created.status(), StatusCode::CREATED);

    let created_body = created
        .json::<Value>()
        .await
        .expect("Failed to parse create category response JSON");
    let id = created_body["id"].as_i64().expect("Category id not found");

    let duplicate = app
        .client
        .post(app.url("/admin/categories"))
        .headers(admin.clone())
        .json(&json!({ "name": "Vegetables" }))
        .send()
        .await
        .expect("Failed to send create category request");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let updated = app
        .client
        .put(app.url(&format!("/admin/categories/{id}")))
        .headers(admin.clone())
        .json(&json!({ "description": "Mostly green things" }))
        .send()
        .await
        .expect("Failed to send update category request");
    assert_eq!(updated.status(), StatusCode::OK);

    let fetched = app
        .client
        .get(app.url(&format!("/categories/{id}")))
        .send()
        .await
        .expect("Failed to send get category request")
        .json::<Value>()
        .await
        .expect("Failed to parse get category response JSON");
    assert_eq!(fetched["name"], "Vegetables");
    assert_eq!(fetched["description"], "Mostly green things");

    let deleted = app
        .client
        .delete(app.url(&format!("/admin/categories/{id}")))
        .headers(admin)
        .send()
        .await
        .expect("Failed to send delete category request");
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = app
        .client
        .get(app.url(&format!("/categories/{id}")))
        .send()
        .await
        .expect("Failed to send get category request");
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_categories_are_sorted_by_name() {
    let app = spawn_app().await;
    let admin = app.admin().await;

    for name in ["Snacks", "Bakery", "Dairy"] {
        app.client
            .post(app.url("/admin/categories"))
            .headers(admin.clone())
            .json(&json!({ "name": name }))
            .send()
            .await
            .expect("Failed to send create category request");
    }

    let listed = app
        .client
        .get(app.url("/categories"))
        .send()
        .await
        .expect("Failed to send list categories request")
        .json::<Value>()
        .await
        .expect("Failed to parse categories JSON");
    let names: Vec<&str> = listed
        .as_array()
        .expect("Categories should be an array")
        .iter()
        .filter_map(|category| category["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Bakery", "Dairy", "Snacks"]);
}

#[tokio::test]
async fn test_shoppers_cannot_manage_categories() {
    let app = spawn_app().await;
    let (headers, _) = app.register("wannabe").await;

    let response = app
        .client
        .post(app.url("/admin/categories"))
        .headers(headers)
        .json(&json!({ "name": "Contraband" }))
        .send()
        .await
        .expect("Failed to send create category request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = response
        .json::<Value>()
        .await
        .expect("Failed to parse error JSON");
    assert_eq!(body["message"], "Not authorized as an admin");
}
