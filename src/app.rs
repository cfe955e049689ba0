use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{activities, auth, docs};

#[utoipa::path(get, path = "/", responses((status = 200, description = "Greeting", body = String)))]
pub async fn root() -> &'static str {
    "Hello World"
}

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Liveness probe", body = String)))]
pub async fn health() -> &'static str {
    "ok"
}

pub fn build_app(state: AppState) -> Router {
    let sessions = auth::session::layer(&state.config.session);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth::router())
        .merge(activities::router())
        .layer(sessions)
        .with_state(state)
        .merge(docs::swagger_ui())
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = addr.parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use reqwest::{header, redirect::Policy, Client, Response, StatusCode};
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::db::{MemoryUserStore, StoreError, User, UserStore};

    async fn spawn(state: AppState) -> String {
        let app = build_app(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn spawn_app() -> String {
        spawn(AppState::fake()).await
    }

    fn client() -> Client {
        Client::builder().redirect(Policy::none()).build().unwrap()
    }

    /// `name=value` of the first `Set-Cookie` for `name`.
    fn cookie_pair(resp: &Response, name: &str) -> Option<String> {
        resp.headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|c| c.starts_with(&format!("{name}=")))
            .map(|c| c.split(';').next().unwrap().to_string())
    }

    async fn signup(base: &str, c: &Client, username: &str, password: &str) -> Response {
        c.post(format!("{base}/signup"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Signs up and logs in, returning the session cookie pair.
    async fn login_as(base: &str, c: &Client, username: &str) -> String {
        assert_eq!(signup(base, c, username, "pw123").await.status(), StatusCode::CREATED);
        let resp = c
            .post(format!("{base}/login"))
            .json(&json!({ "username": username, "password": "pw123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        cookie_pair(&resp, "sid").expect("session cookie")
    }

    async fn add_activity(base: &str, c: &Client, sid: &str, name: &str, date: &str) -> Value {
        let resp = c
            .post(format!("{base}/profile"))
            .header(header::COOKIE, sid)
            .json(&json!({ "name": name, "date": date }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        resp.json().await.unwrap()
    }

    async fn list(base: &str, c: &Client, sid: &str) -> Response {
        c.get(format!("{base}/profile"))
            .header(header::COOKIE, sid)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .unwrap()
    }

    async fn page(base: &str, c: &Client, path: &str, sid: &str) -> String {
        c.get(format!("{base}{path}"))
            .header(header::COOKIE, sid)
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    /// Memory store whose `find_by_id` can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryUserStore,
        down: AtomicBool,
    }

    #[async_trait]
    impl UserStore for FlakyStore {
        async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
            self.inner.insert(username, password_hash).await
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.find_by_id(id).await
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
            self.inner.find_by_username(username).await
        }

        async fn find_by_activity(&self, activity_id: Uuid) -> Result<Option<User>, StoreError> {
            self.inner.find_by_activity(activity_id).await
        }

        async fn save(&self, user: &User) -> Result<(), StoreError> {
            self.inner.save(user).await
        }
    }

    #[tokio::test]
    async fn signup_login_and_track_an_activity() {
        let base = spawn_app().await;
        let c = client();

        let resp = signup(&base, &c, "alice", "pw123").await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["username"], "alice");

        let resp = c
            .post(format!("{base}/login"))
            .json(&json!({ "username": "alice", "password": "pw123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let sid = cookie_pair(&resp, "sid").expect("session cookie");

        let resp = list(&base, &c, &sid).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.json::<Value>().await.unwrap(), json!([]));

        let resp = c
            .post(format!("{base}/profile"))
            .header(header::COOKIE, &sid)
            .json(&json!({ "name": "Yoga", "date": "2024-03-01" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
        let created: Value = resp.json().await.unwrap();
        assert_eq!(location, format!("/profile/{}", created["id"].as_str().unwrap()));

        let activities: Value = list(&base, &c, &sid).await.json().await.unwrap();
        let activities = activities.as_array().unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0]["name"], "Yoga");
        assert_eq!(activities[0]["date"], "2024-03-01");
    }

    #[tokio::test]
    async fn usernames_with_spaces_and_accents_sign_up() {
        let base = spawn_app().await;
        let c = client();
        for name in ["alice smith", "José"] {
            let resp = signup(&base, &c, name, "   ").await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }
        let resp = c
            .post(format!("{base}/login"))
            .json(&json!({ "username": "José", "password": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn fetch_rename_and_delete() {
        let base = spawn_app().await;
        let c = client();
        let sid = login_as(&base, &c, "alice").await;

        let run = add_activity(&base, &c, &sid, "Run", "2024-01-01").await;
        let url = format!("{base}/profile/{}", run["id"].as_str().unwrap());

        let fetched: Value = c
            .get(&url)
            .header(header::COOKIE, &sid)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched["name"], "Run");
        assert_eq!(fetched["date"], "2024-01-01");

        let resp = c
            .put(&url)
            .header(header::COOKIE, &sid)
            .json(&json!({ "name": "Swim" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let renamed: Value = resp.json().await.unwrap();
        assert_eq!(renamed["name"], "Swim");
        assert_eq!(renamed["date"], "2024-01-01");
        assert_eq!(renamed["id"], run["id"]);

        let resp = c.delete(&url).header(header::COOKIE, &sid).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), "Activity deleted");

        let resp = c.delete(&url).header(header::COOKIE, &sid).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = list(&base, &c, &sid).await;
        assert_eq!(resp.json::<Value>().await.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn malformed_activity_ids_are_not_found() {
        let base = spawn_app().await;
        let c = client();
        let sid = login_as(&base, &c, "alice").await;
        let url = format!("{base}/profile/not-an-id");

        let resp = c.delete(&url).header(header::COOKIE, &sid).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.text().await.unwrap(), "Activity not found");

        let resp = c
            .get(&url)
            .header(header::COOKIE, &sid)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = c
            .put(&url)
            .header(header::COOKIE, &sid)
            .json(&json!({ "name": "Swim" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = c.delete(&url).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn activities_are_scoped_to_their_owner() {
        let base = spawn_app().await;
        let c = client();
        let alice = login_as(&base, &c, "alice").await;
        let mallory = login_as(&base, &c, "mallory").await;

        let run = add_activity(&base, &c, &alice, "Run", "2024-01-01").await;
        let url = format!("{base}/profile/{}", run["id"].as_str().unwrap());

        let resp = c
            .get(&url)
            .header(header::COOKIE, &mallory)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = c.delete(&url).header(header::COOKIE, &mallory).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = c.delete(&url).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let activities: Value = list(&base, &c, &alice).await.json().await.unwrap();
        assert_eq!(activities.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_credentials_and_duplicates_are_rejected() {
        let base = spawn_app().await;
        let c = client();
        assert_eq!(signup(&base, &c, "alice", "pw123").await.status(), StatusCode::CREATED);

        let resp = signup(&base, &c, "alice", "other").await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        for (username, password) in [("alice", "wrong"), ("nobody", "pw123")] {
            let resp = c
                .post(format!("{base}/login"))
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
            assert!(cookie_pair(&resp, "sid").is_none());
            assert_eq!(resp.text().await.unwrap(), "Invalid credentials");
        }

        let resp = c
            .post(format!("{base}/login"))
            .json(&json!({ "username": "alice", "password": "pw123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_payloads_are_400s() {
        let base = spawn_app().await;
        let c = client();

        let resp = c
            .post(format!("{base}/signup"))
            .json(&json!({ "password": "pw" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.text().await.unwrap(), "username is required");

        let resp = c
            .post(format!("{base}/signup"))
            .header(header::CONTENT_TYPE, "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let sid = login_as(&base, &c, "alice").await;
        let resp = c
            .post(format!("{base}/profile"))
            .header(header::COOKIE, &sid)
            .json(&json!({ "name": "Run", "date": "someday" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(resp.text().await.unwrap().contains("date"));

        let activities: Value = list(&base, &c, &sid).await.json().await.unwrap();
        assert_eq!(activities, json!([]));
    }

    #[tokio::test]
    async fn guard_redirects_browsers_and_rejects_api_clients() {
        let base = spawn_app().await;
        let c = client();

        let resp = c.get(format!("{base}/profile")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
        let sid = cookie_pair(&resp, "sid").expect("flash lives in a session");

        let login = page(&base, &c, "/login", &sid).await;
        assert!(login.contains("Please login to view your profile"));
        let again = page(&base, &c, "/login", &sid).await;
        assert!(!again.contains("Please login to view your profile"));

        let resp = list(&base, &c, "sid=garbage").await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn store_failure_while_loading_the_user() {
        let store = Arc::new(FlakyStore::default());
        let base = spawn(AppState::fake_with(store.clone())).await;
        let c = client();
        let sid = login_as(&base, &c, "alice").await;

        store.down.store(true, Ordering::SeqCst);

        let resp = c
            .get(format!("{base}/profile"))
            .header(header::COOKIE, &sid)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
        assert!(page(&base, &c, "/login", &sid).await.contains("Error getting activities"));

        let resp = list(&base, &c, &sid).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.text().await.unwrap(), "Internal server error");

        store.down.store(false, Ordering::SeqCst);
        assert_eq!(list(&base, &c, &sid).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn browser_forms_get_pages_and_redirects() {
        let base = spawn_app().await;
        let c = client();
        let form = [("username", "alice"), ("password", "pw123")];

        let resp = c.post(format!("{base}/signup")).form(&form).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(resp.text().await.unwrap().contains("User registered"));

        let resp = c
            .post(format!("{base}/login"))
            .form(&[("username", "alice"), ("password", "nope")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/login");
        let anon = cookie_pair(&resp, "sid").unwrap();
        assert!(page(&base, &c, "/login", &anon).await.contains("Invalid username or password"));

        let resp = c.post(format!("{base}/login")).form(&form).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/profile");
        let sid = cookie_pair(&resp, "sid").unwrap();

        let resp = c
            .post(format!("{base}/profile"))
            .header(header::COOKIE, &sid)
            .form(&[("name", "Yoga"), ("date", "2024-03-01")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = resp.text().await.unwrap();
        assert!(body.contains("Activity added"));
        assert!(body.contains("Yoga"));

        let profile = page(&base, &c, "/profile", &sid).await;
        assert!(profile.contains("Yoga"));
        assert!(profile.contains("2024-03-01"));
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let base = spawn_app().await;
        let c = client();
        let sid = login_as(&base, &c, "alice").await;

        let resp = c
            .post(format!("{base}/logout"))
            .header(header::COOKIE, &sid)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = list(&base, &c, &sid).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn serves_root_health_and_docs() {
        let base = spawn_app().await;
        let c = client();

        let root = c.get(format!("{base}/")).send().await.unwrap();
        assert_eq!(root.status(), StatusCode::OK);
        assert_eq!(root.text().await.unwrap(), "Hello World");

        let health = c.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.text().await.unwrap(), "ok");

        let doc: Value = c
            .get(format!("{base}{}", docs::OPENAPI_JSON))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(doc["openapi"].as_str().unwrap().starts_with("3."));
        assert!(doc["paths"]["/profile/{id}"]["delete"].is_object());

        let ui = c.get(format!("{base}/api-docs/")).send().await.unwrap();
        assert_eq!(ui.status(), StatusCode::OK);
        assert!(ui.text().await.unwrap().to_lowercase().contains("swagger"));
    }
}
