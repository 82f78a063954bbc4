use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use serde_json::{json, Value};
use tb_api::{configure_routes, AppState, PageCache, USER_HEADER};
use tb_core::actions::ThreadActions;
use tb_core::models::NewUser;
use tb_db_sqlite::SqliteThreadRepo;
use uuid::Uuid;

async fn state() -> web::Data<AppState> {
    let repo = Arc::new(SqliteThreadRepo::connect("sqlite::memory:").await.unwrap());
    let cache = Arc::new(PageCache::new());
    let actions = ThreadActions::new(repo, cache.clone());
    web::Data::new(AppState::new(actions, cache, 20))
}

async fn add_user(data: &web::Data<AppState>, name: &str) -> Uuid {
    data.actions
        .upsert_user(NewUser {
            id: Uuid::now_v7(),
            name: name.to_string(),
            image: format!("/avatars/{}.png", name),
        })
        .await
        .unwrap()
        .id
}

macro_rules! app {
    ($data:expr) => {
        test::init_service(App::new().app_data($data.clone()).configure(configure_routes)).await
    };
}

/// Posts JSON as `$user` and returns the decoded response body.
macro_rules! post_json {
    ($app:expr, $uri:expr, $user:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri(&$uri)
            .insert_header((USER_HEADER, $user.to_string()))
            .set_json($body)
            .to_request();
        let body: Value = test::call_and_read_body_json(&$app, req).await;
        body
    }};
}

macro_rules! get_html {
    ($app:expr, $uri:expr) => {{
        let req = test::TestRequest::get().uri(&$uri).to_request();
        String::from_utf8(test::call_and_read_body(&$app, req).await.to_vec()).unwrap()
    }};
}

#[actix_web::test]
async fn create_thread_then_list_posts() {
    let data = state().await;
    let u1 = add_user(&data, "u1").await;
    let app = app!(data);

    let req = test::TestRequest::post()
        .uri("/api/threads")
        .insert_header((USER_HEADER, u1.to_string()))
        .set_json(json!({ "text": "hello", "community_id": Uuid::now_v7(), "path": "/" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["text"], "hello");
    assert_eq!(created["community"], Value::Null);
    assert_eq!(created["author"], u1.to_string());

    let req = test::TestRequest::get().uri("/api/posts?page=1&size=10").to_request();
    let page: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(page["is_next"], false);
    assert_eq!(page["posts"][0]["id"], created["id"]);
    assert_eq!(page["posts"][0]["author"]["name"], "u1");

    let req = test::TestRequest::get().uri(&format!("/api/users/{}", u1)).to_request();
    let user: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(user["threads"], json!([created["id"]]));
}

#[actix_web::test]
async fn writes_require_identity() {
    let data = state().await;
    let app = app!(data);

    let req = test::TestRequest::post()
        .uri("/api/threads")
        .set_json(json!({ "text": "hello" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn comment_on_missing_thread_is_not_found() {
    let data = state().await;
    let u2 = add_user(&data, "u2").await;
    let app = app!(data);

    let req = test::TestRequest::post()
        .uri(&format!("/api/threads/{}/comments", Uuid::now_v7()))
        .insert_header((USER_HEADER, u2.to_string()))
        .set_json(json!({ "text": "nice!" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("Thread not found"));
}

#[actix_web::test]
async fn comment_form_revalidates_thread_page() {
    let data = state().await;
    let u1 = add_user(&data, "u1").await;
    let u2 = add_user(&data, "u2").await;
    let app = app!(data);

    let req = test::TestRequest::post()
        .uri("/api/threads")
        .insert_header((USER_HEADER, u1.to_string()))
        .set_json(json!({ "text": "hello" }))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let thread_id = created["id"].as_str().unwrap().to_string();
    let page = format!("/thread/{}", thread_id);

    // First render is cached and carries the reply form.
    let req = test::TestRequest::get()
        .uri(&page)
        .insert_header((USER_HEADER, u2.to_string()))
        .to_request();
    let html = test::call_and_read_body(&app, req).await;
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains("comment-form"));
    assert!(!html.contains("nice!"));
    assert!(!data.cache.is_empty());

    let req = test::TestRequest::post()
        .uri(&format!("{}/comment", page))
        .insert_header((USER_HEADER, u2.to_string()))
        .set_form([("text", "nice!"), ("path", page.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), page.as_str());

    let req = test::TestRequest::get()
        .uri(&page)
        .insert_header((USER_HEADER, u2.to_string()))
        .to_request();
    let html = test::call_and_read_body(&app, req).await;
    let html = String::from_utf8(html.to_vec()).unwrap();
    assert!(html.contains("nice!"));

    let req = test::TestRequest::get().uri(&format!("/api/threads/{}", thread_id)).to_request();
    let tree: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(tree["children"][0]["text"], "nice!");
    assert_eq!(tree["children"][0]["parent_id"], created["id"]);
    assert_eq!(tree["children"][0]["author"]["name"], "u2");
}

#[actix_web::test]
async fn feed_page_renders_for_signed_out_visitors() {
    let data = state().await;
    let u1 = add_user(&data, "u1").await;
    let app = app!(data);

    let req = test::TestRequest::post()
        .uri("/thread")
        .insert_header((USER_HEADER, u1.to_string()))
        .set_form([("text", "first post")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(html.contains("first post"));
    assert!(html.contains("Signed out"));
}

#[actix_web::test]
async fn invalid_page_number_is_bad_request() {
    let data = state().await;
    let app = app!(data);

    let req = test::TestRequest::get().uri("/api/posts?page=0").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn missing_thread_json_is_not_found() {
    let data = state().await;
    let app = app!(data);

    let req = test::TestRequest::get()
        .uri(&format!("/api/threads/{}", Uuid::now_v7()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn users_only_update_themselves() {
    let data = state().await;
    let u1 = add_user(&data, "u1").await;
    let app = app!(data);

    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{}", Uuid::now_v7()))
        .insert_header((USER_HEADER, u1.to_string()))
        .set_json(json!({ "name": "mallory" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::put()
        .uri(&format!("/api/users/{}", u1))
        .insert_header((USER_HEADER, u1.to_string()))
        .set_json(json!({ "name": "renamed", "image": "/new.png" }))
        .to_request();
    let user: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(user["name"], "renamed");
}

#[actix_web::test]
async fn health_reports_database() {
    let data = state().await;
    let app = app!(data);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["database_connection"], true);
}


#[actix_web::test]
async fn reply_on_nested_page_refreshes_ancestor_pages() {
    let data = state().await;
    let u1 = add_user(&data, "u1").await;
    let app = app!(data);

    let root = post_json!(app, "/api/threads".to_string(), u1, json!({ "text": "root" }));
    let root_id = root["id"].as_str().unwrap().to_string();
    let child = post_json!(
        app,
        format!("/api/threads/{}/comments", root_id),
        u1,
        json!({ "text": "child" })
    );
    let child_id = child["id"].as_str().unwrap().to_string();

    let root_page = format!("/thread/{}", root_id);
    let child_page = format!("/thread/{}", child_id);
    assert!(!get_html!(app, root_page).contains("GRANDCHILD"));

    let req = test::TestRequest::post()
        .uri(&format!("{}/comment", child_page))
        .insert_header((USER_HEADER, u1.to_string()))
        .set_form([("text", "GRANDCHILD"), ("path", child_page.as_str())])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::SEE_OTHER);

    assert!(get_html!(app, root_page).contains("GRANDCHILD"));
    assert!(get_html!(app, child_page).contains("GRANDCHILD"));
}

#[actix_web::test]
async fn json_comment_refreshes_feed() {
    let data = state().await;
    let u1 = add_user(&data, "u1").await;
    let app = app!(data);

    let root = post_json!(app, "/api/threads".to_string(), u1, json!({ "text": "root" }));
    let root_id = root["id"].as_str().unwrap().to_string();
    assert!(get_html!(app, "/".to_string()).contains("0 replies"));

    post_json!(
        app,
        format!("/api/threads/{}/comments", root_id),
        u1,
        json!({ "text": "reply", "path": format!("/thread/{}", root_id) })
    );

    let feed = get_html!(app, "/".to_string());
    assert!(feed.contains("1 reply"));
    assert!(!feed.contains("0 replies"));
}

#[actix_web::test]
async fn unknown_query_parameters_share_one_cache_entry() {
    let data = state().await;
    let app = app!(data);

    for n in 0..50 {
        let req = test::TestRequest::get().uri(&format!("/?junk={}", n)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    assert_eq!(data.cache.len(), 1);
}

#[actix_web::test]
async fn oversized_page_is_bad_request() {
    let data = state().await;
    let app = app!(data);

    let req = test::TestRequest::get().uri("/?size=100000").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    assert!(data.cache.is_empty());
}
