//! Test helpers and utilities

use std::sync::Arc;
use std::time::Duration;

use pivot_core::core::{BufferedOutput, Environment, Response};
use pivot_core::{Application, Server};
use reqwest::{Client, StatusCode};
use tokio::net::TcpListener;

/// Result of one in-memory dispatch cycle.
pub struct Dispatched {
    pub response: Response,
    pub output: Arc<BufferedOutput>,
}

#[allow(dead_code)]
impl Dispatched {
    pub fn status(&self) -> u16 {
        self.output.status().as_u16()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.output
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.output.body_string()).expect("body is not JSON")
    }
}

/// Dispatch `method path` through `app`, capturing what it emits.
pub fn dispatch(app: &Application, method: &str, target: &str) -> Dispatched {
    dispatch_env(app, Environment::builder().method(method).uri(target).build())
}

pub fn dispatch_env(app: &Application, env: Environment) -> Dispatched {
    let output = Arc::new(BufferedOutput::new());
    let mut response = app.dispatch_environment(env, output.clone());
    if !response.is_sent() {
        response.emit(true).expect("emit failed");
    }
    Dispatched { response, output }
}

/// Application served on an ephemeral local port.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub server: Arc<Server>,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn start(app: Application) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("No local address");

        let config = app.config().server.clone();
        let server = Arc::new(Server::new(Arc::new(app), config));
        let runner = Arc::clone(&server);
        tokio::spawn(async move {
            runner.serve(listener).await.expect("server failed");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{}", addr),
            client,
            server,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        json: &T,
    ) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(json)
            .send()
            .await
            .expect("POST request failed")
    }
}

/// Assert response status code
pub fn assert_status(resp: &reqwest::Response, expected: StatusCode) {
    assert_eq!(
        resp.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        resp.status()
    );
}

/// Assert header value starts with expected prefix
pub fn assert_header_starts_with(resp: &reqwest::Response, name: &str, prefix: &str) {
    let value = resp
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Missing header: {}", name))
        .to_str()
        .expect("Invalid header value");
    assert!(
        value.starts_with(prefix),
        "Header '{}' = '{}' does not start with '{}'",
        name,
        value,
        prefix
    );
}
