//! Per-connection HTTP handling.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::request::Parts;
use http::{Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::multipart::parse_multipart;
use super::output::{body_stream, ChannelOutput, DEFAULT_CHANNEL_CAPACITY};
use crate::app::Application;
use crate::core::{server_keys, Environment, EnvironmentBuilder, HttpVersion};

/// Body type of every response served by the adapter.
pub type ResponseBody = BoxBody<Bytes, Infallible>;

/// State shared by all connections of one server.
pub struct ConnectionContext {
    pub app: Arc<Application>,
    pub local_addr: SocketAddr,
    pub max_body_size: usize,
    pub header_timeout: Duration,
    pub active_connections: Arc<AtomicUsize>,
}

impl ConnectionContext {
    /// Serve one TCP connection until it closes or shutdown is signalled.
    ///
    /// On shutdown the connection finishes in-flight requests first.
    pub async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);

        let ctx = Arc::clone(&self);
        let service = service_fn(move |req| {
            let ctx = Arc::clone(&ctx);
            async move { ctx.handle_request(req, remote_addr).await }
        });

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(Some(self.header_timeout))
            .keep_alive(true)
            .http2()
            .max_concurrent_streams(250);

        let conn = builder.serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            _ = shutdown_rx.changed() => {
                conn.as_mut().graceful_shutdown();
                conn.as_mut().await
            }
        };
        if let Err(err) = result {
            debug!(remote = %remote_addr, "connection error: {:?}", err);
        }

        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    async fn handle_request(
        &self,
        req: http::Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<Response<ResponseBody>, Infallible> {
        let (parts, body) = req.into_parts();

        let body = match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                return Ok(plain_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Request body too large",
                ));
            }
            Err(err) => {
                debug!(remote = %remote_addr, "failed to read request body: {}", err);
                return Ok(plain_response(StatusCode::BAD_REQUEST, "Bad Request"));
            }
        };

        let mut builder = capture_environment(&parts, remote_addr, self.local_addr);

        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if content_type
            .to_ascii_lowercase()
            .starts_with("multipart/form-data")
        {
            match parse_multipart(content_type, body.clone(), self.max_body_size as u64).await {
                Ok(form) => {
                    for (name, value) in form.fields {
                        builder = builder.form_field(name, value);
                    }
                    for (field, file) in form.files {
                        builder = builder.file(field, file);
                    }
                }
                Err(err) => {
                    return Ok(plain_response(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to parse multipart form: {}", err),
                    ));
                }
            }
        }

        let env = builder.body(body).build();
        let uploads = upload_paths(&env);
        Ok(self.dispatch(env, uploads).await)
    }

    /// Run the application on a blocking thread, streaming what it emits.
    ///
    /// `uploads` are deleted once the application is done with them.
    async fn dispatch(&self, env: Environment, uploads: Vec<String>) -> Response<ResponseBody> {
        let (output, head_rx, body_rx) = ChannelOutput::channel(DEFAULT_CHANNEL_CAPACITY);
        let output = Arc::new(output);
        let app = Arc::clone(&self.app);

        let task = tokio::task::spawn_blocking(move || {
            let mut response = app.dispatch_environment(env, output.clone());
            if !response.is_sent() {
                if let Err(err) = response.emit(true) {
                    debug!("response emission failed: {}", err);
                }
            }
            drop(response);
            output.finish();
        });

        match head_rx.await {
            Ok((status, headers)) => {
                tokio::spawn(join_dispatch(task, uploads));
                let mut response = Response::new(body_stream(body_rx).boxed());
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
            Err(_) => {
                join_dispatch(task, uploads).await;
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

async fn join_dispatch(task: JoinHandle<()>, uploads: Vec<String>) {
    if let Err(err) = task.await {
        error!("dispatch task failed: {}", err);
    }
    for path in uploads {
        if let Err(err) = tokio::fs::remove_file(&path).await {
            debug!(path = %path, "failed to remove upload: {}", err);
        }
    }
}

/// Temp files written for the uploads of `env`.
fn upload_paths(env: &Environment) -> Vec<String> {
    env.files()
        .values()
        .flatten()
        .map(|file| file.tmp_name.clone())
        .filter(|path| !path.is_empty())
        .collect()
}

fn plain_response(status: StatusCode, body: impl Into<Bytes>) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(body.into()).boxed());
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        http::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Host snapshot of a hyper request head.
///
/// Headers are also exposed as `HTTP_*` server parameters, the way a CGI
/// host would.
pub fn capture_environment(
    parts: &Parts,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
) -> EnvironmentBuilder {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let mut builder = Environment::builder()
        .method(parts.method.as_str())
        .uri(target)
        .version(HttpVersion::from_http(parts.version))
        .headers(parts.headers.clone())
        .remote_addr(remote_addr.ip().to_string())
        .server(server_keys::REMOTE_PORT, remote_addr.port().to_string())
        .server("SERVER_ADDR", local_addr.ip().to_string())
        .server(server_keys::SERVER_PORT, local_addr.port().to_string())
        .server(server_keys::REQUEST_TIME, now.as_secs().to_string())
        .server("REQUEST_TIME_FLOAT", format!("{:.6}", now.as_secs_f64()))
        .server(
            "SERVER_SOFTWARE",
            format!("pivot_core/{}", crate::app::VERSION),
        );

    // HTTP/2 carries the host in the authority.
    let host = parts
        .headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.as_str().to_string()));
    if let Some(host) = host {
        let name = host
            .rsplit_once(':')
            .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
            .map_or(host.as_str(), |(name, _)| name);
        builder = builder
            .server(server_keys::SERVER_NAME, name.to_string())
            .server(server_keys::HTTP_HOST, host.clone());
    }

    for (name, value) in &parts.headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        let key = name.as_str().to_ascii_uppercase().replace('-', "_");
        let key = match key.as_str() {
            "CONTENT_TYPE" | "CONTENT_LENGTH" => key,
            _ => format!("HTTP_{}", key),
        };
        builder = builder.server(key, value.to_string());
    }

    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{UploadedFile, UPLOAD_ERR_OK, UPLOAD_ERR_SIZE};

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = http::Request::builder().method("POST").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_capture_environment() {
        let parts = parts(
            "/users/5?active=1",
            &[
                ("host", "example.test:8080"),
                ("content-type", "application/json"),
                ("x-request-id", "abc"),
            ],
        );
        let env = capture_environment(
            &parts,
            "10.0.0.7:51000".parse().unwrap(),
            "127.0.0.1:8080".parse().unwrap(),
        )
        .build();

        assert_eq!(env.method(), &http::Method::POST);
        assert_eq!(env.path(), "/users/5");
        assert_eq!(env.query_string(), "active=1");
        assert_eq!(env.server("REMOTE_ADDR"), Some("10.0.0.7"));
        assert_eq!(env.server("REMOTE_PORT"), Some("51000"));
        assert_eq!(env.server("SERVER_NAME"), Some("example.test"));
        assert_eq!(env.server("SERVER_PORT"), Some("8080"));
        assert_eq!(env.server("HTTP_HOST"), Some("example.test:8080"));
        assert_eq!(env.server("CONTENT_TYPE"), Some("application/json"));
        assert_eq!(env.server("HTTP_X_REQUEST_ID"), Some("abc"));
        assert_eq!(env.server("REQUEST_URI"), Some("/users/5?active=1"));
        assert!(env.server("REQUEST_TIME").is_some());
    }

    #[test]
    fn test_upload_paths_skip_rejected_files() {
        let upload = |tmp_name: &str, error| UploadedFile {
            name: "a.txt".into(),
            mime_type: "text/plain".into(),
            tmp_name: tmp_name.into(),
            size: 1,
            error,
        };
        let env = Environment::builder()
            .file("doc", upload("/tmp/pivot1", UPLOAD_ERR_OK))
            .file("doc", upload("/tmp/pivot2", UPLOAD_ERR_OK))
            .file("big", upload("", UPLOAD_ERR_SIZE))
            .build();

        let mut paths = upload_paths(&env);
        paths.sort();
        assert_eq!(paths, ["/tmp/pivot1", "/tmp/pivot2"]);
    }

    #[tokio::test]
    async fn test_join_dispatch_removes_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pivot-upload");
        std::fs::write(&path, b"abc").unwrap();

        let task = tokio::task::spawn_blocking(|| {});
        join_dispatch(task, vec![path.to_string_lossy().into_owned()]).await;
        assert!(!path.exists());
    }

    #[test]
    fn test_plain_response() {
        let res = plain_response(StatusCode::PAYLOAD_TOO_LARGE, "too big");
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(res.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    }
}
