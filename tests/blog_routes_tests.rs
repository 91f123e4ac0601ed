use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use tower::ServiceExt;

use quill_blog::db::BlogStorage;
use quill_blog::router::{BlogState, blog_router};

static DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

struct TestApp {
    app: Router,
    storage: BlogStorage,
    path: PathBuf,
}

impl TestApp {
    async fn spawn() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "quill-blog-routes-{}-{}-{}.sqlite",
            std::process::id(),
            nanos,
            DB_COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        let storage = BlogStorage::connect(&format!("sqlite:{}", path.display()))
            .await
            .expect("failed to open temp database");
        let state = BlogState::new(storage.clone(), "test-secret", false);
        Self {
            app: blog_router(state),
            storage,
            path,
        }
    }

    fn client(&self) -> Client {
        Client {
            app: self.app.clone(),
            cookies: BTreeMap::new(),
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// A browser stand-in that keeps the cookies the app sets.
struct Client {
    app: Router,
    cookies: BTreeMap<String, String>,
}

impl Client {
    async fn send(&mut self, builder: axum::http::request::Builder, body: Body) -> Response {
        let builder = if self.cookies.is_empty() {
            builder
        } else {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder.header(header::COOKIE, cookie)
        };
        let resp = self
            .app
            .clone()
            .oneshot(builder.body(body).expect("failed to build request"))
            .await
            .expect("request failed");

        for set in resp.headers().get_all(header::SET_COOKIE) {
            let set = set.to_str().expect("set-cookie was not ascii");
            let pair = set.split(';').next().unwrap_or_default();
            let (name, value) = pair.split_once('=').expect("malformed set-cookie");
            if value.is_empty() || set.contains("Max-Age=0") {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
        resp
    }

    async fn get(&mut self, uri: &str) -> Response {
        self.send(Request::builder().method("GET").uri(uri), Body::empty())
            .await
    }

    async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> Response {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(body),
        )
        .await
    }

    async fn register(&mut self, username: &str, email: &str, password: &str) -> Response {
        self.post_form(
            "/register",
            &[
                ("username", username),
                ("email", email),
                ("password", password),
                ("confirm_password", password),
            ],
        )
        .await
    }

    async fn login(&mut self, email: &str, password: &str) -> Response {
        self.post_form("/login", &[("email", email), ("password", password)])
            .await
    }

    async fn signed_up(&mut self, username: &str) {
        let email = format!("{username}@x.com");
        let resp = self.register(username, &email, "pw123").await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let resp = self.login(&email, "pw123").await;
        assert_eq!(location(&resp), "/dashboard");
    }
}

fn location(resp: &Response) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .expect("response had no location")
        .to_str()
        .expect("location was not ascii")
}

async fn body_text(resp: Response) -> String {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    String::from_utf8(body.to_vec()).expect("response body was not utf-8")
}

async fn body_json(resp: Response) -> serde_json::Value {
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&body).expect("response body was not json")
}

#[tokio::test]
async fn register_login_post_and_see_it_on_dashboard() {
    let app = TestApp::spawn().await;
    let mut alice = app.client();

    let resp = alice.register("alice", "alice@x.com", "pw123").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");

    let resp = alice.login("alice@x.com", "pw123").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");

    let resp = alice
        .post_form("/post/new", &[("title", "Hello"), ("content", "World")])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");

    let resp = alice.get("/dashboard").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("Hello"));
    assert!(html.contains("Your post has been created!"));

    // flash is shown once
    let html = body_text(alice.get("/dashboard").await).await;
    assert!(!html.contains("Your post has been created!"));

    let html = body_text(alice.get("/").await).await;
    assert!(html.contains("Hello"));
    assert!(html.contains("World"));
}

#[tokio::test]
async fn registration_stores_a_hash_not_the_password() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.register("alice", "alice@x.com", "pw123").await;

    let user = app
        .storage
        .find_user_by_email("alice@x.com")
        .await
        .unwrap()
        .expect("user was not created");
    assert_ne!(user.password_hash, "pw123");
    assert!(user.password_hash.starts_with("$argon2"));
}

#[tokio::test]
async fn duplicate_registration_rerenders_with_field_error() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.register("alice", "alice@x.com", "pw123").await;

    let resp = client.register("alice", "other@x.com", "pw123").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("That username is taken"));
    assert!(
        app.storage
            .find_user_by_email("other@x.com")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn wrong_password_does_not_start_a_session() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.register("alice", "alice@x.com", "pw123").await;

    let resp = client.login("alice@x.com", "nope").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains("Login failed. Please check your email and password."));

    let resp = client.get("/dashboard").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn anonymous_visitor_is_sent_to_login_with_next() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let resp = client.get("/dashboard").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login?next=%2Fdashboard");

    let html = body_text(client.get("/login?next=%2Fdashboard").await).await;
    assert!(html.contains("Please log in to access this page."));

    client.register("alice", "alice@x.com", "pw123").await;
    let resp = client
        .post_form(
            "/login?next=%2Fpost%2Fnew",
            &[("email", "alice@x.com"), ("password", "pw123")],
        )
        .await;
    assert_eq!(location(&resp), "/post/new");
}

#[tokio::test]
async fn non_owner_cannot_delete_a_post() {
    let app = TestApp::spawn().await;
    let mut alice = app.client();
    alice.signed_up("alice").await;
    alice
        .post_form("/post/new", &[("title", "Hello"), ("content", "World")])
        .await;
    let post_id = app.storage.list_all_posts().await.unwrap()[0].id;

    let mut bob = app.client();
    bob.signed_up("bob").await;
    let resp = bob
        .post_form(&format!("/post/{post_id}/delete"), &[])
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "You cannot delete a post that is not yours");

    let posts = body_json(bob.get("/api/posts").await).await;
    assert_eq!(posts.as_array().map(Vec::len), Some(1));
    assert_eq!(posts[0]["title"], "Hello");
}

#[tokio::test]
async fn non_owner_edit_is_redirected_and_post_unchanged() {
    let app = TestApp::spawn().await;
    let mut alice = app.client();
    alice.signed_up("alice").await;
    alice
        .post_form("/post/new", &[("title", "Hello"), ("content", "World")])
        .await;
    let post_id = app.storage.list_all_posts().await.unwrap()[0].id;

    let mut bob = app.client();
    bob.signed_up("bob").await;
    let resp = bob
        .post_form(
            &format!("/post/{post_id}/edit"),
            &[("title", "Hijacked"), ("content", "x")],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/post/{post_id}"));

    let html = body_text(bob.get(&format!("/post/{post_id}")).await).await;
    assert!(html.contains("You cannot edit a post that is not yours."));

    let post = app.storage.get_post(post_id).await.unwrap().unwrap();
    assert_eq!(post.title, "Hello");
    assert_eq!(post.content, "World");
}

#[tokio::test]
async fn owner_can_edit_and_delete_and_comments_go_with_the_post() {
    let app = TestApp::spawn().await;
    let mut alice = app.client();
    alice.signed_up("alice").await;
    alice
        .post_form("/post/new", &[("title", "Hello"), ("content", "World")])
        .await;
    let post_id = app.storage.list_all_posts().await.unwrap()[0].id;

    let resp = alice
        .post_form(
            &format!("/post/{post_id}/edit"),
            &[("title", "Hello again"), ("content", "World")],
        )
        .await;
    assert_eq!(location(&resp), format!("/post/{post_id}"));

    let resp = alice
        .post_form(&format!("/post/{post_id}/comment"), &[("content", "Nice")])
        .await;
    assert_eq!(location(&resp), format!("/post/{post_id}"));
    let html = body_text(alice.get(&format!("/post/{post_id}")).await).await;
    assert!(html.contains("Hello again"));
    assert!(html.contains("Nice"));
    assert!(html.contains("Your comment has been added!"));

    let resp = alice
        .post_form(&format!("/post/{post_id}/delete"), &[])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Post deleted successfully");

    assert!(app.storage.get_post(post_id).await.unwrap().is_none());
    assert!(
        app.storage
            .list_comments_for_post(post_id)
            .await
            .unwrap()
            .is_empty()
    );
    let resp = alice.get(&format!("/post/{post_id}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_comment_is_rejected_without_writing() {
    let app = TestApp::spawn().await;
    let mut alice = app.client();
    alice.signed_up("alice").await;
    alice
        .post_form("/post/new", &[("title", "Hello"), ("content", "World")])
        .await;
    let post_id = app.storage.list_all_posts().await.unwrap()[0].id;

    let resp = alice
        .post_form(&format!("/post/{post_id}/comment"), &[("content", "   ")])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let html = body_text(alice.get(&format!("/post/{post_id}")).await).await;
    assert!(html.contains("Comment cannot be empty."));
    assert!(
        app.storage
            .list_comments_for_post(post_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn post_owner_may_delete_others_comments_but_strangers_may_not() {
    let app = TestApp::spawn().await;
    let mut alice = app.client();
    alice.signed_up("alice").await;
    alice
        .post_form("/post/new", &[("title", "Hello"), ("content", "World")])
        .await;
    let post_id = app.storage.list_all_posts().await.unwrap()[0].id;

    let mut bob = app.client();
    bob.signed_up("bob").await;
    bob.post_form(&format!("/post/{post_id}/comment"), &[("content", "first")])
        .await;
    bob.post_form(&format!("/post/{post_id}/comment"), &[("content", "second")])
        .await;
    let comments = app.storage.list_comments_for_post(post_id).await.unwrap();
    assert_eq!(comments[0].content, "second");

    let mut carol = app.client();
    carol.signed_up("carol").await;
    let resp = carol
        .post_form(&format!("/comment/{}/delete", comments[0].id), &[])
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(resp).await["message"],
        "You cannot delete this comment"
    );

    let resp = alice
        .post_form(&format!("/comment/{}/delete", comments[0].id), &[])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await["message"],
        "Comment deleted successfully"
    );

    let resp = bob
        .post_form(&format!("/comment/{}/delete", comments[1].id), &[])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = bob.post_form("/comment/9999/delete", &[]).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["success"], false);
}

#[tokio::test]
async fn api_serves_posts_and_comments_as_json() {
    let app = TestApp::spawn().await;
    let mut alice = app.client();
    alice.signed_up("alice").await;
    alice
        .post_form("/post/new", &[("title", "First"), ("content", "one")])
        .await;
    alice
        .post_form("/post/new", &[("title", "Second"), ("content", "two")])
        .await;
    let posts = app.storage.list_all_posts().await.unwrap();
    let newest = posts[0].id;
    alice
        .post_form(&format!("/post/{newest}/comment"), &[("content", "hi")])
        .await;

    let mut anon = app.client();
    let resp = anon.get("/api/posts").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json[0]["title"], "Second");
    assert_eq!(json[1]["title"], "First");
    assert_eq!(json[0]["author"], "alice");
    assert_eq!(json[0]["comment_count"], 1);
    assert!(json[0]["created_at"].is_string());

    let json = body_json(anon.get(&format!("/api/posts/{newest}")).await).await;
    assert_eq!(json["id"], newest);
    assert_eq!(json["content"], "two");

    let json = body_json(anon.get(&format!("/api/posts/{newest}/comments")).await).await;
    assert_eq!(json[0]["content"], "hi");
    assert_eq!(json[0]["post_id"], newest);

    let resp = anon.get("/api/posts/9999").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"]["code"], "NOT_FOUND");

    let resp = anon.get("/api/posts/9999/comments").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_routes_and_bad_ids_are_not_found() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let resp = client.get("/no/such/page").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_text(resp).await.contains("404"));

    assert_eq!(client.get("/post/abc").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(client.get("/post/42").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(client.get("/?page=2").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(client.get("/?page=1").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn index_paginates_five_per_page() {
    let app = TestApp::spawn().await;
    let mut alice = app.client();
    alice.signed_up("alice").await;
    for i in 1..=7 {
        let title = format!("Post number {i}");
        alice
            .post_form("/post/new", &[("title", title.as_str()), ("content", "body")])
            .await;
    }

    let html = body_text(alice.get("/").await).await;
    assert!(html.contains("Post number 7"));
    assert!(html.contains("Post number 3"));
    assert!(!html.contains("Post number 2"));

    let html = body_text(alice.get("/?page=2").await).await;
    assert!(html.contains("Post number 2"));
    assert!(html.contains("Post number 1"));
    assert!(!html.contains("Post number 3"));

    assert_eq!(alice.get("/?page=3").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.signed_up("alice").await;
    assert_eq!(client.get("/dashboard").await.status(), StatusCode::OK);

    let resp = client.get("/logout").await;
    assert_eq!(location(&resp), "/");
    let html = body_text(client.get("/").await).await;
    assert!(html.contains("You have been logged out."));

    assert_eq!(client.get("/dashboard").await.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn login_ignores_next_with_control_characters() {
    let app = TestApp::spawn().await;
    app.client()
        .register("alice", "alice@x.com", "pw123")
        .await;

    for next in ["%2F%09%2Fevil.example", "%2Fa%0Ab", "%2F%0D%0A%2Fevil.example"] {
        let mut client = app.client();
        let resp = client
            .post_form(
                &format!("/login?next={next}"),
                &[("email", "alice@x.com"), ("password", "pw123")],
            )
            .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "next = {next}");
        assert_eq!(location(&resp), "/dashboard", "next = {next}");
    }
}

#[tokio::test]
async fn non_owner_is_rejected_before_edit_input_is_checked() {
    let app = TestApp::spawn().await;
    let mut alice = app.client();
    alice.signed_up("alice").await;
    alice
        .post_form("/post/new", &[("title", "Hello"), ("content", "World")])
        .await;
    let post_id = app.storage.list_all_posts().await.unwrap()[0].id;

    let mut bob = app.client();
    bob.signed_up("bob").await;

    let resp = bob.get(&format!("/post/{post_id}/edit")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/post/{post_id}"));

    let resp = bob
        .post_form(
            &format!("/post/{post_id}/edit"),
            &[("title", ""), ("content", "")],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/post/{post_id}"));

    let html = body_text(bob.get(&format!("/post/{post_id}")).await).await;
    assert!(html.contains("You cannot edit a post that is not yours."));
    assert!(!html.contains("Title must be between"));

    let post = app.storage.get_post(post_id).await.unwrap().unwrap();
    assert_eq!(post.title, "Hello");
    assert_eq!(post.content, "World");
}

#[tokio::test]
async fn json_routes_reject_bad_ids_with_json() {
    let app = TestApp::spawn().await;
    let mut client = app.client();
    client.signed_up("alice").await;

    for uri in ["/api/posts/abc", "/api/posts/abc/comments"] {
        let resp = client.get(uri).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body_json(resp).await["error"]["code"], "NOT_FOUND", "{uri}");
    }

    for uri in ["/post/abc/delete", "/comment/abc/delete"] {
        let resp = client.post_form(uri, &[]).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body_json(resp).await["success"], false, "{uri}");
    }
}

#[tokio::test]
async fn error_page_keeps_the_signed_in_navigation() {
    let app = TestApp::spawn().await;

    let mut anon = app.client();
    let resp = anon.get("/post/9999").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let html = body_text(resp).await;
    assert!(html.contains("href=\"/login\""));
    assert!(!html.contains("Logout"));

    let mut alice = app.client();
    alice.signed_up("alice").await;
    let resp = alice.get("/no/such/page").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let html = body_text(resp).await;
    assert!(html.contains("Page not found"));
    assert!(html.contains("Logout"));
    assert!(html.contains("alice"));
}
