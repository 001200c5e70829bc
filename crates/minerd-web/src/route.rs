//! Request classification.
//!
//! Every inbound request is mapped to exactly one [`RouteDecision`] by a
//! fixed table over method and path. Classification is pure; the dispatcher
//! in [`crate::server`] acts on the decision.

use axum::http::Method;
use minerd_core::{HostType, PlotDirAction};

/// Prefix of static assets.
pub const ASSET_PREFIX: &str = "/assets/";

const GET: &[Method] = &[Method::GET];
const POST: &[Method] = &[Method::POST];
const GET_HEAD: &[Method] = &[Method::GET, Method::HEAD];
const GET_POST: &[Method] = &[Method::GET, Method::POST];

/// Templated pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Login,
    Settings,
    PlotFiles,
}

impl Page {
    /// Name of the content template of this page.
    pub fn template(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Login => "login",
            Self::Settings => "settings",
            Self::PlotFiles => "plotfiles",
        }
    }
}

/// Login form submission or logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Login,
    Logout,
}

/// Named JSON API actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiAction {
    Settings,
    PlotDir(PlotDirAction),
    Rescan,
    PlotCheck,
    PlotCheckAll,
    Shutdown,
    Restart,
    Nonce,
    MiningInfo,
    Version,
    Metrics,
}

impl ApiAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::PlotDir(PlotDirAction::Add) => "plotdir_add",
            Self::PlotDir(PlotDirAction::Remove) => "plotdir_remove",
            Self::Rescan => "rescan",
            Self::PlotCheck => "plotcheck",
            Self::PlotCheckAll => "plotcheck_all",
            Self::Shutdown => "shutdown",
            Self::Restart => "restart",
            Self::Nonce => "nonce",
            Self::MiningInfo => "mininginfo",
            Self::Version => "version",
            Self::Metrics => "metrics",
        }
    }

    /// Actions that mutate miner or process state and need credentials.
    pub fn is_privileged(&self) -> bool {
        matches!(
            self,
            Self::Settings
                | Self::PlotDir(_)
                | Self::Rescan
                | Self::PlotCheck
                | Self::PlotCheckAll
                | Self::Shutdown
                | Self::Restart
        )
    }
}

/// Classification result of an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Static file, path relative to the asset root.
    Asset(String),
    /// Page only shown to logged-in users.
    SecuredPage(Page),
    /// Page shown to everyone.
    PlainPage(Page),
    AuthAction(AuthAction),
    ApiAction(ApiAction),
    /// Relay to a backend; the path is what the backend sees.
    Forward(HostType, String),
    /// Upgrade to the push channel.
    PushChannel,
    NotFound,
    BadRequest,
}

impl RouteDecision {
    /// Low-cardinality label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Asset(_) => "asset",
            Self::SecuredPage(_) => "secured_page",
            Self::PlainPage(_) => "page",
            Self::AuthAction(AuthAction::Login) => "login",
            Self::AuthAction(AuthAction::Logout) => "logout",
            Self::ApiAction(action) => action.name(),
            Self::Forward(HostType::Pool, _) => "forward_pool",
            Self::Forward(HostType::Wallet, _) => "forward_wallet",
            Self::PushChannel => "ws",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
        }
    }
}

/// Map a request line to a decision.
///
/// `query` is the raw query string without the leading `?`. Known paths
/// requested with the wrong method are `BadRequest`; unknown paths are
/// `NotFound`.
pub fn classify(method: &Method, path: &str, query: Option<&str>) -> RouteDecision {
    if let Some(rest) = path.strip_prefix(ASSET_PREFIX) {
        return only(method, GET_HEAD, RouteDecision::Asset(rest.to_string()));
    }
    if let Some(decision) = forward_prefix(path, query) {
        return decision;
    }

    match path {
        "/" => only(method, GET, RouteDecision::SecuredPage(Page::Dashboard)),
        "/settings" => only(method, GET, RouteDecision::SecuredPage(Page::Settings)),
        "/plotfiles" => only(method, GET, RouteDecision::SecuredPage(Page::PlotFiles)),
        "/login" if *method == Method::GET => RouteDecision::PlainPage(Page::Login),
        "/login" if *method == Method::POST => RouteDecision::AuthAction(AuthAction::Login),
        "/login" => RouteDecision::BadRequest,
        "/logout" => only(method, GET_POST, RouteDecision::AuthAction(AuthAction::Logout)),
        "/ws" => only(method, GET, RouteDecision::PushChannel),
        "/metrics" => only(method, GET, RouteDecision::ApiAction(ApiAction::Metrics)),
        "/burst" => classify_burst(path, query),
        _ => match path.strip_prefix("/api/") {
            Some(name) => classify_api(method, name),
            None => RouteDecision::NotFound,
        },
    }
}

fn classify_api(method: &Method, name: &str) -> RouteDecision {
    let (action, allowed): (ApiAction, &[Method]) = match name {
        "settings" => (ApiAction::Settings, POST),
        "plotdirs/add" => (ApiAction::PlotDir(PlotDirAction::Add), POST),
        "plotdirs/remove" => (ApiAction::PlotDir(PlotDirAction::Remove), POST),
        "rescan" => (ApiAction::Rescan, POST),
        "plotcheck" => (ApiAction::PlotCheck, POST),
        "plotcheck/all" => (ApiAction::PlotCheckAll, POST),
        "shutdown" => (ApiAction::Shutdown, POST),
        "restart" => (ApiAction::Restart, POST),
        "nonce" => (ApiAction::Nonce, POST),
        "mininginfo" => (ApiAction::MiningInfo, GET),
        "version" => (ApiAction::Version, GET),
        _ => return RouteDecision::NotFound,
    };
    only(method, allowed, RouteDecision::ApiAction(action))
}

/// The burst-style endpoint multiplexes on `requestType`.
fn classify_burst(path: &str, query: Option<&str>) -> RouteDecision {
    match query.and_then(|q| query_param(q, "requestType")).as_deref() {
        Some("getMiningInfo") => RouteDecision::ApiAction(ApiAction::MiningInfo),
        Some("submitNonce") => RouteDecision::ApiAction(ApiAction::Nonce),
        Some(_) => RouteDecision::Forward(HostType::Wallet, with_query(path, query)),
        None => RouteDecision::BadRequest,
    }
}

/// `/pool/...` and `/wallet/...` relay to the backend with the prefix removed.
fn forward_prefix(path: &str, query: Option<&str>) -> Option<RouteDecision> {
    HostType::ALL.iter().find_map(|host| {
        let prefix = format!("/{}", host.as_str());
        let rest = path.strip_prefix(&prefix)?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        let rest = if rest.is_empty() { "/" } else { rest };
        Some(RouteDecision::Forward(*host, with_query(rest, query)))
    })
}

fn with_query(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path.to_string(),
    }
}

fn only(method: &Method, allowed: &[Method], decision: RouteDecision) -> RouteDecision {
    if allowed.contains(method) {
        decision
    } else {
        RouteDecision::BadRequest
    }
}

/// Value of `key` in a raw query string. `+` and `%XX` are decoded.
pub fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (percent_decode(k) == key).then(|| percent_decode(v))
    })
}

fn percent_decode(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> RouteDecision {
        classify(&Method::GET, path, None)
    }

    fn post(path: &str) -> RouteDecision {
        classify(&Method::POST, path, None)
    }

    #[test]
    fn test_pages() {
        assert_eq!(get("/"), RouteDecision::SecuredPage(Page::Dashboard));
        assert_eq!(get("/settings"), RouteDecision::SecuredPage(Page::Settings));
        assert_eq!(get("/plotfiles"), RouteDecision::SecuredPage(Page::PlotFiles));
        assert_eq!(get("/login"), RouteDecision::PlainPage(Page::Login));
        assert_eq!(post("/login"), RouteDecision::AuthAction(AuthAction::Login));
        assert_eq!(get("/logout"), RouteDecision::AuthAction(AuthAction::Logout));
    }

    #[test]
    fn test_assets() {
        assert_eq!(get("/assets/css/site.css"), RouteDecision::Asset("css/site.css".into()));
        assert_eq!(post("/assets/app.js"), RouteDecision::BadRequest);
    }

    #[test]
    fn test_api_table() {
        let cases = [
            ("/api/settings", ApiAction::Settings),
            ("/api/plotdirs/add", ApiAction::PlotDir(PlotDirAction::Add)),
            ("/api/plotdirs/remove", ApiAction::PlotDir(PlotDirAction::Remove)),
            ("/api/rescan", ApiAction::Rescan),
            ("/api/plotcheck", ApiAction::PlotCheck),
            ("/api/plotcheck/all", ApiAction::PlotCheckAll),
            ("/api/shutdown", ApiAction::Shutdown),
            ("/api/restart", ApiAction::Restart),
            ("/api/nonce", ApiAction::Nonce),
        ];
        for (path, action) in cases {
            assert_eq!(post(path), RouteDecision::ApiAction(action), "{path}");
            assert_eq!(get(path), RouteDecision::BadRequest, "{path}");
        }
        assert_eq!(get("/api/mininginfo"), RouteDecision::ApiAction(ApiAction::MiningInfo));
        assert_eq!(get("/api/version"), RouteDecision::ApiAction(ApiAction::Version));
        assert_eq!(get("/metrics"), RouteDecision::ApiAction(ApiAction::Metrics));
    }

    #[test]
    fn test_privileged_actions() {
        assert!(ApiAction::Shutdown.is_privileged());
        assert!(ApiAction::PlotDir(PlotDirAction::Remove).is_privileged());
        assert!(ApiAction::PlotCheckAll.is_privileged());
        assert!(!ApiAction::Nonce.is_privileged());
        assert!(!ApiAction::MiningInfo.is_privileged());
        assert!(!ApiAction::Metrics.is_privileged());
    }

    #[test]
    fn test_unknown_paths() {
        assert_eq!(get("/nope"), RouteDecision::NotFound);
        assert_eq!(post("/api/format-disk"), RouteDecision::NotFound);
        assert_eq!(get("/poolside"), RouteDecision::NotFound);
        assert_eq!(get("/ws"), RouteDecision::PushChannel);
    }

    #[test]
    fn test_burst_dispatch() {
        let burst = |q| classify(&Method::GET, "/burst", Some(q));
        assert_eq!(burst("requestType=getMiningInfo"), RouteDecision::ApiAction(ApiAction::MiningInfo));
        assert_eq!(
            classify(&Method::POST, "/burst", Some("requestType=submitNonce&nonce=1")),
            RouteDecision::ApiAction(ApiAction::Nonce)
        );
        assert_eq!(
            burst("requestType=getBlock&height=5"),
            RouteDecision::Forward(HostType::Wallet, "/burst?requestType=getBlock&height=5".into())
        );
        assert_eq!(burst("foo=bar"), RouteDecision::BadRequest);
        assert_eq!(classify(&Method::GET, "/burst", None), RouteDecision::BadRequest);
    }

    #[test]
    fn test_forward_prefixes() {
        assert_eq!(
            classify(&Method::POST, "/pool/burst", Some("requestType=submitNonce")),
            RouteDecision::Forward(HostType::Pool, "/burst?requestType=submitNonce".into())
        );
        assert_eq!(get("/wallet"), RouteDecision::Forward(HostType::Wallet, "/".into()));
        assert_eq!(
            classify(&Method::DELETE, "/wallet/x", None),
            RouteDecision::Forward(HostType::Wallet, "/x".into())
        );
    }

    #[test]
    fn test_labels_are_bounded() {
        assert_eq!(get("/assets/a/b/c.css").label(), "asset");
        assert_eq!(get("/wallet/any/thing").label(), "forward_wallet");
        assert_eq!(post("/api/plotdirs/add").label(), "plotdir_add");
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("a=1&b=two", "b").as_deref(), Some("two"));
        assert_eq!(query_param("path=%2Fplots%2Fx+y", "path").as_deref(), Some("/plots/x y"));
        assert_eq!(query_param("flag", "flag").as_deref(), Some(""));
        assert_eq!(query_param("a=1", "z"), None);
        assert_eq!(query_param("bad=%zz%", "bad").as_deref(), Some("%zz%"));
    }
}
