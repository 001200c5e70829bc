//! Site fixture: templates and assets in a temp dir plus a router over it.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use minerd_web::{create_router, AppState, BroadcastHub, WebConfig};
use tempfile::TempDir;
use tower::ServiceExt;

use super::mocks::{MockHost, MockRig};

pub const USER: &str = "admin";
pub const PASS: &str = "hunter2";

/// A temp dir holding `templates/`, `public/` and a file outside of both.
pub struct Site {
    pub dir: TempDir,
}

impl Site {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        let public = dir.path().join("public");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::create_dir_all(public.join("css")).unwrap();

        for (name, source) in [
            ("layout", "<html><title>%TITLE%</title><nav>%NAV_AUTH%</nav>%CONTENT%</html>"),
            ("dashboard", "<p>height=%HEIGHT% sig=%GENERATION_SIGNATURE% unknown=%NOPE%</p>"),
            ("login", "<form>%LOGIN_ERROR%</form>"),
            ("settings", "<p>deadline=%TARGET_DEADLINE_SECS%</p>"),
            ("plotfiles", "<ul>%PLOT_DIRS%</ul>"),
        ] {
            std::fs::write(templates.join(format!("{name}.html")), source).unwrap();
        }
        std::fs::write(public.join("css/site.css"), "body{}").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "top secret").unwrap();

        Self { dir }
    }

    pub fn config(&self, with_auth: bool) -> WebConfig {
        let (username, password) = if with_auth {
            (USER.to_string(), PASS.to_string())
        } else {
            (String::new(), String::new())
        };
        WebConfig {
            title: "rig-01".to_string(),
            template_dir: self.dir.path().join("templates"),
            asset_dir: self.dir.path().join("public"),
            username,
            password,
            ..Default::default()
        }
    }
}

pub fn state(config: WebConfig, rig: MockRig, host: MockHost) -> AppState {
    let hub = BroadcastHub::new(config.push_queue_capacity, config.max_push_clients);
    AppState::new(config, Arc::new(rig), Arc::new(host), hub).unwrap()
}

pub fn router(config: WebConfig, rig: MockRig, host: MockHost) -> Router {
    create_router(state(config, rig, host))
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

pub fn with_cookie(mut request: Request<Body>, cookie: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    request
}

pub fn with_basic_auth(mut request: Request<Body>, user: &str, pass: &str) -> Request<Body> {
    let value = format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")));
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, value.parse().unwrap());
    request
}

/// Log in and return the `name=value` pair to send back as `Cookie`.
pub async fn login(router: &Router) -> String {
    let response = send(router, post_form("/login", &format!("user={USER}&pass={PASS}"))).await;
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login sets a cookie")
        .to_str()
        .unwrap()
        .to_string();
    set_cookie.split(';').next().unwrap().to_string()
}
