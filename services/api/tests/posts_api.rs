mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use image::{ImageBuffer, ImageFormat, Rgb};
use serde_json::{Value, json};

use common::{TestApp, body_json, post_payload};

const POSTS_URL: &str = "/posts";

fn detail_url(id: i64) -> String {
    format!("/posts/{}", id)
}

fn upload_url(id: i64) -> String {
    format!("/posts/{}/upload-image", id)
}

fn ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|post| post["id"].as_i64().unwrap())
        .collect()
}

async fn create_post(app: &TestApp, token: &str, payload: Value) -> Value {
    let (status, body) = app.post(POSTS_URL, Some(token), payload).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

fn png_bytes() -> Vec<u8> {
    let img = ImageBuffer::from_fn(10, 10, |_, _| Rgb([255u8, 0u8, 0u8]));
    let mut content = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut content), ImageFormat::Png)
        .unwrap();
    content
}

fn multipart_request(uri: &str, token: &str, field: &str, content: &[u8]) -> Request<Body> {
    let boundary = "X-BLOG-TEST-BOUNDARY";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_list_posts_is_public() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;
    create_post(&app, &token, post_payload("First")).await;

    let (status, body) = app.get(POSTS_URL, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_posts_omits_content_and_orders_newest_first() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;
    let first = create_post(&app, &token, post_payload("First")).await;
    let second = create_post(&app, &token, post_payload("Second")).await;

    let (_, body) = app.get(POSTS_URL, None).await;

    assert_eq!(
        ids(&body),
        vec![second["id"].as_i64().unwrap(), first["id"].as_i64().unwrap()]
    );
    for post in body.as_array().unwrap() {
        assert!(post.get("content").is_none());
        assert!(post.get("slug").is_some());
    }
}

#[tokio::test]
async fn test_retrieve_post_includes_content() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;
    let post = create_post(&app, &token, post_payload("First")).await;

    let (status, body) = app.get(&detail_url(post["id"].as_i64().unwrap()), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Test content");
    assert_eq!(body["title"], "First");
}

#[tokio::test]
async fn test_retrieve_missing_post_is_not_found() {
    let app = TestApp::new();

    let (status, _) = app.get(&detail_url(999), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/posts/not-a-number", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_post_requires_authentication() {
    let app = TestApp::new();

    let (status, _) = app.post(POSTS_URL, None, post_payload("Test")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_post_forbidden_for_regular_user() {
    let app = TestApp::new();
    let (_, token) = app.user("test@example.com").await;

    let (status, _) = app.post(POSTS_URL, Some(&token), post_payload("Test")).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_permission_is_checked_before_existence() {
    let app = TestApp::new();
    let (_, token) = app.user("test@example.com").await;

    let (status, _) = app
        .patch(&detail_url(999), Some(&token), json!({"title": "x"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&detail_url(999), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .patch("/posts/abc", Some(&token), json!({"title": "x"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete("/posts/abc", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_numeric_id_is_not_found_for_admin() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;

    let (status, _) = app
        .patch("/posts/abc", Some(&token), json!({"title": "x"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete("/posts/abc", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_permission_is_checked_before_body_validation() {
    let app = TestApp::new();
    let (_, token) = app.user("test@example.com").await;

    let (status, _) = app.post(POSTS_URL, Some(&token), json!({})).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_staff_user_may_create_posts() {
    let app = TestApp::new();
    let (user, token) = app.staff("staff@example.com").await;

    let body = create_post(&app, &token, post_payload("Staff post")).await;

    assert_eq!(body["by"], user.id);
}

#[tokio::test]
async fn test_create_post_assigns_defaults() {
    let app = TestApp::new();
    let (user, token) = app.superuser("admin@example.com").await;

    let body = create_post(&app, &token, post_payload("My First Post")).await;

    assert_eq!(body["by"], user.id);
    assert_eq!(body["status"], "draft");
    assert_eq!(body["keywords"], "");
    assert_eq!(body["slug"], "my-first-post");
    assert_eq!(body["tags"], json!([]));
    assert_eq!(body["image"], Value::Null);
}

#[tokio::test]
async fn test_create_post_ignores_client_owner() {
    let app = TestApp::new();
    let (admin, token) = app.superuser("admin@example.com").await;
    let (other, _) = app.user("other@example.com").await;

    let mut payload = post_payload("Test");
    payload["by"] = json!(other.id);
    let body = create_post(&app, &token, payload).await;

    assert_eq!(body["by"], admin.id);
}

#[tokio::test]
async fn test_derived_slugs_are_unique_per_day() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;

    let first = create_post(&app, &token, post_payload("Same title")).await;
    let second = create_post(&app, &token, post_payload("Same title")).await;

    assert_eq!(first["slug"], "same-title");
    assert_eq!(second["slug"], "same-title-2");
}

#[tokio::test]
async fn test_explicit_duplicate_slug_is_rejected() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;

    let mut payload = post_payload("Test");
    payload["slug"] = json!("custom-slug");
    create_post(&app, &token, payload.clone()).await;

    let (status, body) = app.post(POSTS_URL, Some(&token), payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["slug"].is_array());
}

#[tokio::test]
async fn test_create_post_validates_fields() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;

    let (status, body) = app
        .post(
            POSTS_URL,
            Some(&token),
            json!({"title": "Test", "content": "Test", "read_time_min": -1, "status": "archived"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["read_time_min"].is_array());
    assert!(body["fields"]["status"].is_array());
}

#[tokio::test]
async fn test_create_post_with_new_tags() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;

    let mut payload = post_payload("Tagged");
    payload["tags"] = json!([{"name": "rust"}, {"name": "web"}]);
    let body = create_post(&app, &token, payload).await;

    let names: Vec<&str> = body["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["rust", "web"]);

    let (_, tags) = app.get("/tags", None).await;
    assert_eq!(tags.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_post_reuses_existing_tag() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;
    let (status, tag) = app.post("/tags", Some(&token), json!({"name": "rust"})).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut payload = post_payload("Tagged");
    payload["tags"] = json!([{"name": "rust"}, {"name": "rust"}]);
    let body = create_post(&app, &token, payload).await;

    assert_eq!(body["tags"], json!([{"id": tag["id"], "name": "rust"}]));
    let (_, tags) = app.get("/tags", None).await;
    assert_eq!(tags.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tags_are_scoped_to_their_owner() {
    let app = TestApp::new();
    let (_, first_token) = app.superuser("first@example.com").await;
    let (_, second_token) = app.superuser("second@example.com").await;

    let mut payload = post_payload("Tagged");
    payload["tags"] = json!([{"name": "shared"}]);
    let first = create_post(&app, &first_token, payload.clone()).await;
    let second = create_post(&app, &second_token, payload).await;

    assert_ne!(first["tags"][0]["id"], second["tags"][0]["id"]);
}

#[tokio::test]
async fn test_partial_update_keeps_owner_slug_and_tags() {
    let app = TestApp::new();
    let (admin, token) = app.superuser("admin@example.com").await;
    let (other, _) = app.user("other@example.com").await;

    let mut payload = post_payload("Original");
    payload["tags"] = json!([{"name": "rust"}]);
    let post = create_post(&app, &token, payload).await;
    let id = post["id"].as_i64().unwrap();

    let (status, body) = app
        .patch(
            &detail_url(id),
            Some(&token),
            json!({"title": "Changed", "by": other.id, "slug": "changed"}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Changed");
    assert_eq!(body["by"], admin.id);
    assert_eq!(body["slug"], "original");
    assert_eq!(body["tags"], post["tags"]);
}

#[tokio::test]
async fn test_partial_update_with_tags_replaces_set() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;

    let mut payload = post_payload("Tagged");
    payload["tags"] = json!([{"name": "old"}]);
    let post = create_post(&app, &token, payload).await;
    let id = post["id"].as_i64().unwrap();

    let (status, body) = app
        .patch(&detail_url(id), Some(&token), json!({"tags": [{"name": "new"}]}))
        .await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["new"]);

    let (_, body) = app
        .patch(&detail_url(id), Some(&token), json!({"tags": []}))
        .await;
    assert_eq!(body["tags"], json!([]));
}

#[tokio::test]
async fn test_full_update_requires_every_field() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;
    let post = create_post(&app, &token, post_payload("Original")).await;
    let id = post["id"].as_i64().unwrap();

    let (status, body) = app
        .put(&detail_url(id), Some(&token), json!({"title": "Only title"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["content"].is_array());

    let (status, body) = app
        .put(
            &detail_url(id),
            Some(&token),
            json!({"title": "Replaced", "content": "New", "read_time_min": 9, "status": "published"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Replaced");
    assert_eq!(body["read_time_min"], 9);
    assert_eq!(body["status"], "published");
    assert_eq!(body["slug"], "original");
}

#[tokio::test]
async fn test_update_missing_post_is_not_found_for_admin() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;

    let (status, _) = app
        .patch(&detail_url(999), Some(&token), json!({"title": "x"}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_post() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;
    let post = create_post(&app, &token, post_payload("Doomed")).await;
    let id = post["id"].as_i64().unwrap();

    let (status, body) = app.delete(&detail_url(id), Some(&token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = app.get(&detail_url(id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app.get(POSTS_URL, None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_filter_posts_by_tags() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;

    let mut first = post_payload("First");
    first["tags"] = json!([{"name": "one"}]);
    let first = create_post(&app, &token, first).await;

    let mut second = post_payload("Second");
    second["tags"] = json!([{"name": "two"}]);
    let second = create_post(&app, &token, second).await;

    let mut both = post_payload("Both");
    both["tags"] = json!([{"name": "one"}, {"name": "two"}]);
    let both = create_post(&app, &token, both).await;

    create_post(&app, &token, post_payload("Untagged")).await;

    let one = first["tags"][0]["id"].as_i64().unwrap();
    let two = second["tags"][0]["id"].as_i64().unwrap();

    let (status, body) = app
        .get(&format!("{}?tags={},{}", POSTS_URL, one, two), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        ids(&body),
        vec![
            both["id"].as_i64().unwrap(),
            second["id"].as_i64().unwrap(),
            first["id"].as_i64().unwrap(),
        ]
    );
}

#[tokio::test]
async fn test_filter_posts_by_invalid_tag_id() {
    let app = TestApp::new();

    let (status, body) = app.get("/posts?tags=1,abc", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["tags"].is_array());
}

#[tokio::test]
async fn test_search_posts_by_keywords() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;

    let mut matching = post_payload("Matching");
    matching["keywords"] = json!("MY TEST");
    let matching = create_post(&app, &token, matching).await;

    let mut other = post_payload("Other");
    other["keywords"] = json!("unrelated");
    create_post(&app, &token, other).await;

    let (status, body) = app.get("/posts?search=my", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![matching["id"].as_i64().unwrap()]);
}

#[tokio::test]
async fn test_search_and_tags_compose() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;

    let mut tagged = post_payload("Tagged");
    tagged["tags"] = json!([{"name": "one"}]);
    tagged["keywords"] = json!("rust");
    let tagged = create_post(&app, &token, tagged).await;

    let mut untagged = post_payload("Untagged");
    untagged["keywords"] = json!("rust");
    create_post(&app, &token, untagged).await;

    let tag = tagged["tags"][0]["id"].as_i64().unwrap();
    let (_, body) = app
        .get(&format!("/posts?tags={}&search=RUST", tag), None)
        .await;

    assert_eq!(ids(&body), vec![tagged["id"].as_i64().unwrap()]);
}

#[tokio::test]
async fn test_upload_image_to_post() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;
    let post = create_post(&app, &token, post_payload("Illustrated")).await;
    let id = post["id"].as_i64().unwrap();

    let response = app
        .request(multipart_request(&upload_url(id), &token, "image", &png_bytes()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["id"], id);
    let image = body["image"].as_str().unwrap();
    assert!(image.starts_with("uploads/post/"));
    assert!(image.ends_with(".png"));
    assert!(app.media.path().join(image).exists());

    let (_, detail) = app.get(&detail_url(id), None).await;
    assert_eq!(detail["image"], image);
}

#[tokio::test]
async fn test_upload_invalid_image() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;
    let post = create_post(&app, &token, post_payload("Illustrated")).await;
    let id = post["id"].as_i64().unwrap();

    let response = app
        .request(multipart_request(&upload_url(id), &token, "image", b"notimage"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["fields"]["image"].is_array());

    let (_, detail) = app.get(&detail_url(id), None).await;
    assert_eq!(detail["image"], Value::Null);
}

#[tokio::test]
async fn test_upload_without_image_field() {
    let app = TestApp::new();
    let (_, token) = app.superuser("admin@example.com").await;
    let post = create_post(&app, &token, post_payload("Illustrated")).await;
    let id = post["id"].as_i64().unwrap();

    let response = app
        .request(multipart_request(&upload_url(id), &token, "file", &png_bytes()))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_forbidden_for_regular_user() {
    let app = TestApp::new();
    let (_, admin_token) = app.superuser("admin@example.com").await;
    let (_, token) = app.user("test@example.com").await;
    let post = create_post(&app, &admin_token, post_payload("Illustrated")).await;
    let id = post["id"].as_i64().unwrap();

    let response = app
        .request(multipart_request(&upload_url(id), &token, "image", &png_bytes()))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let app = TestApp::with_upload_limit(32);
    let (_, token) = app.superuser("admin@example.com").await;
    let post = create_post(&app, &token, post_payload("Illustrated")).await;
    let id = post["id"].as_i64().unwrap();

    let response = app
        .request(multipart_request(&upload_url(id), &token, "image", &png_bytes()))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deleting_user_removes_their_posts() {
    let app = TestApp::new();
    let (admin, token) = app.superuser("admin@example.com").await;
    create_post(&app, &token, post_payload("Owned")).await;

    app.delete_user(admin.id).await;

    let (_, list) = app.get(POSTS_URL, None).await;
    assert!(list.as_array().unwrap().is_empty());
}
