use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const HYPERVISOR_SERVICE: &str = "virtmanager.services";
pub const SUPERVISOR_SERVICE: &str = "supervisor.services";

#[derive(Debug, Error)]
pub enum ImporterError {
    #[error("cannot reach {url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} answered with HTTP status {code}")]
    Http { url: String, code: u16 },
    #[error("malformed reply from {url}: {reason}")]
    Protocol { url: String, reason: String },
    #[error("remote call {service}.{method} failed: {message}")]
    Remote { service: String, method: String, message: String }
}

/// Where an importer call goes and how long it may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub timeout: Option<Duration>
}

impl Endpoint {
    /// Exporter living on `host`, reached at `https://<host>/exporter/`.
    pub fn exporter(host: &str, timeout: Option<Duration>) -> Self {
        Self{url: format!("https://{}/exporter/", host), timeout: timeout}
    }
}

/// Remote procedure call client used to talk to exporters and to the
/// supervision service.
pub trait Importer: Send + Sync {
    fn call(&self, endpoint: &Endpoint, service: &str, method: &str, args: &[Value]) -> Result<Value, ImporterError>;
}

#[derive(Serialize)]
struct CallRequest<'a> {
    service: &'a str,
    method: &'a str,
    args: &'a [Value]
}

#[derive(Deserialize)]
struct CallReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>
}

/// Importer speaking JSON over HTTP(S): one POST per call.
#[derive(Default)]
pub struct HttpImporter {}

impl HttpImporter {
    pub fn new() -> Self {
        Self{}
    }

    #[tokio::main]
    async fn post(&self, endpoint: &Endpoint, request: &CallRequest<'_>) -> Result<CallReply, ImporterError> {
        let transport = |e: reqwest::Error| ImporterError::Transport{
            url: endpoint.url.clone(),
            reason: e.to_string()};
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = endpoint.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(transport)?;
        let response = client.post(&endpoint.url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(ImporterError::Http{url: endpoint.url.clone(), code: response.status().as_u16()});
        }
        response.json::<CallReply>().await.map_err(|e| ImporterError::Protocol{
            url: endpoint.url.clone(),
            reason: e.to_string()})
    }
}

impl Importer for HttpImporter {
    fn call(&self, endpoint: &Endpoint, service: &str, method: &str, args: &[Value]) -> Result<Value, ImporterError> {
        debug!("Calling {}.{} on {}", service, method, endpoint.url);
        let request = CallRequest{service: service, method: method, args: args};
        let reply = self.post(endpoint, &request).map_err(|e| {
            error!("Importer call {}.{} failed: {}", service, method, e);
            e
        })?;
        match reply.error {
            Some(message) => {
                error!("Remote end refused {}.{}: {}", service, method, message);
                Err(ImporterError::Remote{
                    service: service.to_string(),
                    method: method.to_string(),
                    message: message})
            },
            None => Ok(reply.result)
        }
    }
}

/// Loose truthiness of a reply: empty and zero-like values are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve_once;
    use serde_json::json;
    use std::net::TcpListener;

    #[test]
    fn exporter_endpoint_url() {
        let endpoint = Endpoint::exporter("10.0.0.5", Some(Duration::from_secs(3)));
        assert_eq!(endpoint.url, "https://10.0.0.5/exporter/");
        assert_eq!(endpoint.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!({"vm1": "online"})));
    }

    #[test]
    fn call_posts_request_and_returns_result() {
        let (url, server) = serve_once("200 OK", r#"{"result": {"vm1": "online"}}"#);
        let endpoint = Endpoint{url: url, timeout: Some(Duration::from_secs(5))};
        let reply = HttpImporter::new()
            .call(&endpoint, HYPERVISOR_SERVICE, "domain_start", &[json!("vm1")])
            .unwrap();
        assert_eq!(reply, json!({"vm1": "online"}));

        let request = server.join().unwrap();
        assert!(request.starts_with("POST "));
        let body: Value = serde_json::from_str(request.split("\r\n\r\n").nth(1).unwrap()).unwrap();
        assert_eq!(body, json!({"service": "virtmanager.services", "method": "domain_start", "args": ["vm1"]}));
    }

    #[test]
    fn remote_error_member() {
        let (url, server) = serve_once("200 OK", r#"{"error": "no such domain"}"#);
        let endpoint = Endpoint{url: url, timeout: Some(Duration::from_secs(5))};
        let err = HttpImporter::new().call(&endpoint, HYPERVISOR_SERVICE, "get_status", &[]).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, ImporterError::Remote{ref message, ..} if message == "no such domain"));
    }

    #[test]
    fn http_failure_status() {
        let (url, server) = serve_once("500 Internal Server Error", "");
        let endpoint = Endpoint{url: url, timeout: Some(Duration::from_secs(5))};
        let err = HttpImporter::new().call(&endpoint, HYPERVISOR_SERVICE, "get_status", &[]).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, ImporterError::Http{code: 500, ..}));
    }

    #[test]
    fn refused_connection_is_transport_error() {
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let endpoint = Endpoint{url: format!("http://127.0.0.1:{}/exporter/", port), timeout: Some(Duration::from_secs(2))};
        let err = HttpImporter::new().call(&endpoint, HYPERVISOR_SERVICE, "get_status", &[]).unwrap_err();
        assert!(matches!(err, ImporterError::Transport{..}));
    }
}
