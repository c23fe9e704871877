use std::time::Duration;

use tracing::debug;

use crate::{Result, SyncError};

/// Request/response HTTP used by the command executors.
///
/// A non-success status comes back as [`SyncError::Http`] carrying the
/// response body; failures to reach the server as
/// [`SyncError::Transport`].
pub trait CommandTransport: Send + Sync {
    fn get(&self, path: &str) -> Result<String>;

    fn post_json(&self, path: &str, body: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct UreqCommandTransport {
    base_url: String,
    agent: ureq::Agent,
}

impl UreqCommandTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn into_error(err: ureq::Error) -> SyncError {
    match err {
        ureq::Error::Status(status, response) => SyncError::Http {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => SyncError::Transport(transport.to_string()),
    }
}

impl CommandTransport for UreqCommandTransport {
    fn get(&self, path: &str) -> Result<String> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self.agent.get(&url).call().map_err(into_error)?;
        Ok(response.into_string()?)
    }

    fn post_json(&self, path: &str, body: &str) -> Result<String> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(body)
            .map_err(into_error)?;
        Ok(response.into_string()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_once(status: u16, body: &'static str) -> (String, std::thread::JoinHandle<String>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = std::thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut received = String::new();
            request.as_reader().read_to_string(&mut received).unwrap();
            let seen = format!("{} {} {}", request.method(), request.url(), received);
            let response = tiny_http::Response::from_string(body).with_status_code(status);
            request.respond(response).unwrap();
            seen
        });
        (format!("http://127.0.0.1:{}/", port), handle)
    }

    #[test]
    fn test_get_and_post() {
        let (base, handle) = serve_once(200, "ok");
        let transport = UreqCommandTransport::new(&base, Duration::from_secs(5));
        assert_eq!(transport.get("/server/command/stop/x").unwrap(), "ok");
        assert_eq!(handle.join().unwrap(), "GET /server/command/stop/x ");

        let (base, handle) = serve_once(200, "{}");
        let transport = UreqCommandTransport::new(&base, Duration::from_secs(5));
        assert_eq!(transport.post_json("/p", r#"{"a":1}"#).unwrap(), "{}");
        assert_eq!(handle.join().unwrap(), r#"POST /p {"a":1}"#);
    }

    #[test]
    fn test_status_error_keeps_body() {
        let (base, handle) = serve_once(404, "File 'x' not found");
        let transport = UreqCommandTransport::new(&base, Duration::from_secs(5));
        let err = transport.get("/anything").unwrap_err();
        handle.join().unwrap();
        match err {
            SyncError::Http { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "File 'x' not found");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_https_scheme_is_supported() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport =
            UreqCommandTransport::new(&format!("https://127.0.0.1:{}", port), Duration::from_secs(2));
        match transport.get("/server/status").unwrap_err() {
            SyncError::Transport(message) => {
                assert!(!message.to_lowercase().contains("scheme"), "{}", message)
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
