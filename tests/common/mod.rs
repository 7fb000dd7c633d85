#![allow(dead_code)]

use ads_mcp::services::settings::Settings;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Submit,
    Status,
    Download,
    Profiles,
    List,
    Exchange,
}

impl Route {
    const ALL: [Route; 6] = [
        Route::Submit,
        Route::Status,
        Route::Download,
        Route::Profiles,
        Route::List,
        Route::Exchange,
    ];

    fn classify(method: &Method, path: &str) -> Option<Route> {
        match *method {
            Method::POST if path == "/auth/exchange" => Some(Route::Exchange),
            Method::POST if path.starts_with("/v2/") && path.ends_with("/report") => {
                Some(Route::Submit)
            }
            Method::GET if path.starts_with("/v2/reports/") => Some(Route::Status),
            Method::GET if path.starts_with("/files/") => Some(Route::Download),
            Method::GET if path == "/v2/profiles" => Some(Route::Profiles),
            Method::GET | Method::PUT | Method::DELETE if path.starts_with("/v2/") => {
                Some(Route::List)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: serde_json::to_vec(&body).unwrap(),
            headers: vec![("content-type".into(), "application/json".into())],
        }
    }

    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub route: Route,
    pub path: String,
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    scripts: Mutex<HashMap<Route, VecDeque<Reply>>>,
    counters: HashMap<Route, AtomicUsize>,
    requests: Mutex<Vec<Recorded>>,
    unmatched: AtomicUsize,
}

/// In-process stand-in for the advertising API. Each route replays its
/// scripted replies in order and repeats the last one once exhausted.
#[derive(Clone)]
pub struct MockUpstream {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            counters: Route::ALL
                .into_iter()
                .map(|route| (route, AtomicUsize::new(0)))
                .collect(),
            ..MockState::default()
        });
        let app = Router::new().fallback(dispatch).with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn script(&self, route: Route, replies: Vec<Reply>) {
        self.state
            .scripts
            .lock()
            .unwrap()
            .insert(route, replies.into_iter().collect());
    }

    pub fn calls(&self, route: Route) -> usize {
        self.state.counters[&route].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        Route::ALL.iter().map(|r| self.calls(*r)).sum::<usize>()
            + self.state.unmatched.load(Ordering::SeqCst)
    }

    pub fn requests(&self, route: Route) -> Vec<Recorded> {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.route == route)
            .cloned()
            .collect()
    }

    pub fn file_url(&self, name: &str) -> String {
        format!("{}/files/{}", self.base_url, name)
    }

    /// Settings pointed at this mock with a short poll interval.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::for_base_url(&self.base_url).unwrap();
        settings.auth_exchange_url =
            Some(url::Url::parse(&format!("{}/auth/exchange", self.base_url)).unwrap());
        settings.poll_interval_ms = 5;
        settings.request_timeout_ms = 5_000;
        settings
    }
}

async fn dispatch(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(route) = Route::classify(&method, uri.path()) else {
        state.unmatched.fetch_add(1, Ordering::SeqCst);
        return StatusCode::NOT_FOUND.into_response();
    };
    state.counters[&route].fetch_add(1, Ordering::SeqCst);
    state.requests.lock().unwrap().push(Recorded {
        route,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .map(|(k, v)| (k.as_str().to_lowercase(), v.to_str().unwrap_or("").to_string()))
            .collect(),
        body: body.to_vec(),
    });

    let reply = {
        let mut scripts = state.scripts.lock().unwrap();
        match scripts.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    };
    let Some(reply) = reply else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut out_headers = HeaderMap::new();
    for (name, value) in &reply.headers {
        out_headers.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    let status = StatusCode::from_u16(reply.status).unwrap();
    (status, out_headers, reply.body).into_response()
}

pub fn credentials(profile_id: Option<&str>) -> Value {
    let mut creds = serde_json::json!({
        "access_token": "Atza|integration-token-0001",
        "client_id": "amzn1.application-oa2-client.test",
    });
    if let Some(profile_id) = profile_id {
        creds["profile_id"] = Value::String(profile_id.to_string());
    }
    creds
}

pub fn report_rows() -> Value {
    serde_json::json!([
        {"campaignId": 1, "campaignName": "Alpha", "impressions": 100, "clicks": 10,
         "cost": 5.0, "attributedSales14d": 50.0, "attributedConversions14d": 2},
        {"campaignId": 2, "campaignName": "Beta", "impressions": 150, "clicks": 15,
         "cost": 7.5, "attributedSales14d": 75.0, "attributedConversions14d": 3},
        {"campaignId": 3, "campaignName": "Gamma", "impressions": 50, "clicks": 5,
         "cost": 2.5, "attributedSales14d": 25.0, "attributedConversions14d": 1}
    ])
}
