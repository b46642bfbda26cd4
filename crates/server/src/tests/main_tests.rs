use super::*;
use axum::{body, body::Body, http::Request, response::Response};
use tower::ServiceExt;

async fn test_app() -> (Router, Storage, i64) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let user = storage.create_user("alice").await.expect("user");
    let app = build_router(Arc::new(AppState {
        api: ApiContext::new(storage.clone()),
    }));
    (app, storage, user.0)
}

fn post_json(uri: impl AsRef<str>, payload: serde_json::Value) -> Request<Body> {
    Request::post(uri.as_ref())
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage, _user_id) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn login_returns_stable_user_id() {
    let (app, _storage, user_id) = test_app().await;
    let response = app
        .clone()
        .oneshot(post_json("/login", serde_json::json!({ "username": "alice" })))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let dto: LoginResponse = json_body(response).await;
    assert_eq!(dto.user_id, user_id);

    let rejected = app
        .oneshot(post_json("/login", serde_json::json!({ "username": " " })))
        .await
        .expect("response");
    assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn create_article_then_see_it_on_dashboard() {
    let (app, _storage, user_id) = test_app().await;
    let create = post_json(
        format!("/posts/store?user_id={user_id}"),
        serde_json::json!({
            "title": "Hello, World!",
            "excerpt": "",
            "content": "<p>Some text</p>",
            "featured_image": "https://cdn.example.com/hello.png",
            "status": "published",
        }),
    );
    let response = app.clone().oneshot(create).await.expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: ArticleCreated = json_body(response).await;
    assert_eq!(created.redirect_to, "/dashboard");
    assert_eq!(created.message, "Article created successfully!");
    assert_eq!(created.article.slug, "hello-world");
    assert_eq!(created.article.excerpt, "Some text");
    assert!(created.article.published_at.is_some());

    let dashboard = Request::get("/dashboard?page=1")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(dashboard).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let view: DashboardView = json_body(response).await;
    assert_eq!(view.pagination.total, 1);
    assert_eq!(view.articles[0].id, created.article.id);
    assert_eq!(view.articles[0].author.name, "alice");
}

#[tokio::test]
async fn invalid_form_returns_field_errors() {
    let (app, _storage, user_id) = test_app().await;
    let create = post_json(
        format!("/posts/store?user_id={user_id}"),
        serde_json::json!({ "title": "", "content": "x", "status": "draft" }),
    );
    let response = app.clone().oneshot(create).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(err.fields.get("title"), Some("The title field is required."));

    let dashboard = Request::get("/dashboard")
        .body(Body::empty())
        .expect("request");
    let view: DashboardView = json_body(app.oneshot(dashboard).await.expect("response")).await;
    assert!(view.articles.is_empty());
}

#[tokio::test]
async fn dashboard_paginates_and_tolerates_out_of_range_pages() {
    let (app, _storage, user_id) = test_app().await;
    for i in 0..12 {
        let create = post_json(
            format!("/posts/store?user_id={user_id}"),
            serde_json::json!({ "title": format!("Post {i}"), "content": "x", "status": "draft" }),
        );
        let response = app.clone().oneshot(create).await.expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let second = Request::get("/dashboard?page=2")
        .body(Body::empty())
        .expect("request");
    let view: DashboardView = json_body(app.clone().oneshot(second).await.expect("response")).await;
    assert_eq!(view.articles.len(), 2);
    assert_eq!(view.articles[1].title, "Post 0");
    assert_eq!(view.pagination.last_page, 2);

    let far = Request::get("/dashboard?page=50")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(far).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let view: DashboardView = json_body(response).await;
    assert!(view.articles.is_empty());
    assert_eq!(view.pagination.total, 12);
}

#[tokio::test]
async fn published_and_draft_routes_split_by_status() {
    let (app, _storage, user_id) = test_app().await;
    for (title, status) in [("Live", "published"), ("Wip", "draft"), ("Old", "archived")] {
        let create = post_json(
            format!("/posts/store?user_id={user_id}"),
            serde_json::json!({ "title": title, "content": "x", "status": status }),
        );
        app.clone().oneshot(create).await.expect("response");
    }

    let published = Request::get("/articles/published")
        .body(Body::empty())
        .expect("request");
    let view: DashboardView = json_body(app.clone().oneshot(published).await.expect("response")).await;
    assert_eq!(
        view.articles.iter().map(|a| a.title.as_str()).collect::<Vec<_>>(),
        vec!["Live"]
    );

    let drafts = Request::get("/articles/drafts")
        .body(Body::empty())
        .expect("request");
    let view: DashboardView = json_body(app.oneshot(drafts).await.expect("response")).await;
    assert_eq!(
        view.articles.iter().map(|a| a.title.as_str()).collect::<Vec<_>>(),
        vec!["Wip"]
    );
}

#[tokio::test]
async fn view_counter_route_increments_or_404s() {
    let (app, _storage, user_id) = test_app().await;
    let create = post_json(
        format!("/posts/store?user_id={user_id}"),
        serde_json::json!({ "title": "Counted", "content": "x", "status": "published" }),
    );
    let created: ArticleCreated = json_body(app.clone().oneshot(create).await.expect("response")).await;

    for expected in 1..=3 {
        let bump = Request::post(format!("/articles/{}/views", created.article.id.0))
            .body(Body::empty())
            .expect("request");
        let response = app.clone().oneshot(bump).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let updated: ViewsUpdated = json_body(response).await;
        assert_eq!(updated.views_count, expected);
    }

    let missing = Request::post("/articles/777/views")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(missing).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn unknown_author_is_an_internal_error() {
    let (app, _storage, _user_id) = test_app().await;
    let create = post_json(
        "/posts/store?user_id=4242",
        serde_json::json!({ "title": "Ghost", "content": "x", "status": "draft" }),
    );
    let response = app.oneshot(create).await.expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let (app, _storage, user_id) = test_app().await;
    let payload = vec![b'a'; MAX_BODY_BYTES + 1];
    let request = Request::post(format!("/posts/store?user_id={user_id}"))
        .header("content-type", "application/json")
        .header("content-length", payload.len())
        .body(Body::from(payload))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn malformed_page_numbers_fall_back_instead_of_failing() {
    let (app, _storage, user_id) = test_app().await;
    let create = post_json(
        format!("/posts/store?user_id={user_id}"),
        serde_json::json!({ "title": "Only", "content": "x", "status": "published" }),
    );
    app.clone().oneshot(create).await.expect("response");

    for uri in ["/dashboard?page=-1", "/dashboard?page=abc", "/articles/published?page=0"] {
        let request = Request::get(uri).body(Body::empty()).expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let view: DashboardView = json_body(response).await;
        assert_eq!(view.pagination.page, 1, "{uri}");
        assert_eq!(view.articles.len(), 1, "{uri}");
    }

    let huge = Request::get("/dashboard?page=99999999999")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(huge).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let view: DashboardView = json_body(response).await;
    assert!(view.articles.is_empty());
    assert_eq!(view.pagination.total, 1);
}

#[tokio::test]
async fn wrongly_typed_form_fields_get_field_errors() {
    let (app, _storage, user_id) = test_app().await;
    let create = post_json(
        format!("/posts/store?user_id={user_id}"),
        serde_json::json!({ "title": 123, "content": "x", "status": "draft" }),
    );
    let response = app.oneshot(create).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(err.fields.get("title"), Some("The title field must be a string."));
}

#[tokio::test]
async fn unreadable_requests_still_get_json_errors() {
    let (app, _storage, user_id) = test_app().await;

    let broken = Request::post(format!("/posts/store?user_id={user_id}"))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let response = app.clone().oneshot(broken).await.expect("response");
    assert!(response.status().is_client_error());
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::Validation);

    let anonymous = post_json(
        "/posts/store",
        serde_json::json!({ "title": "t", "content": "x", "status": "draft" }),
    );
    let response = app.clone().oneshot(anonymous).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let bad_id = Request::post("/articles/abc/views")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(bad_id).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::NotFound);
}
