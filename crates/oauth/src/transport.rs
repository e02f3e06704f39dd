//! Vendor HTTP boundary.
//!
//! Every vendor reply is a JSON envelope `{status, body, error?}`. [`call`] is
//! the single place that unwraps it: `status == 0` yields `body`, anything
//! else becomes [`Error::VendorApi`].

use std::{rc::Rc, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, de::DeserializeOwned},
    serde_json::Value,
    tracing::{debug, trace},
};

use crate::error::{Error, INVALID_TOKEN_STATUS, Result};

/// Parameters whose values never reach the logs.
const REDACTED_PARAMS: &[&str] = &["signature", "client_secret", "code", "refresh_token"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Parameters go in the query string.
    Get,
    /// Parameters go in a form-encoded body.
    Post,
}

/// One vendor API request.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API root, e.g. `/v2/oauth2`.
    pub path: String,
    pub params: Vec<(String, String)>,
    pub bearer: Option<Secret<String>>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            bearer: None,
        }
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.params.extend(params);
        self
    }

    #[must_use]
    pub fn bearer(mut self, token: Secret<String>) -> Self {
        self.bearer = Some(token);
        self
    }

    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `action` parameter, used to label errors and logs.
    pub fn action(&self) -> &str {
        self.param_value("action").unwrap_or(self.path.as_str())
    }

    fn redacted_params(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| {
                if REDACTED_PARAMS.contains(&k.as_str()) {
                    format!("{k}=[REDACTED]")
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Sends a request and returns the raw reply envelope.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<Value>;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send(&self, request: &ApiRequest) -> Result<Value> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &ApiRequest) -> Result<Value> {
        (**self).send(request)
    }
}

#[derive(Deserialize)]
struct Envelope {
    status: i64,
    #[serde(default)]
    body: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Send `request` and unwrap the envelope into its `body`.
pub fn call(transport: &dyn Transport, request: &ApiRequest) -> Result<Value> {
    let action = request.action();
    let raw = transport.send(request)?;
    let envelope: Envelope =
        serde_json::from_value(raw).map_err(|e| Error::malformed(action, e))?;

    if envelope.status != 0 {
        debug!(action, status = envelope.status, "vendor call failed");
        return Err(Error::VendorApi {
            action: action.to_string(),
            status: envelope.status,
            message: envelope.error.unwrap_or_else(|| "no error message".into()),
        });
    }
    Ok(envelope.body)
}

/// [`call`], then decode the body into `T`.
pub fn call_as<T: DeserializeOwned>(transport: &dyn Transport, request: &ApiRequest) -> Result<T> {
    let body = call(transport, request)?;
    serde_json::from_value(body).map_err(|e| Error::malformed(request.action(), e))
}

/// Blocking HTTP transport rooted at the vendor API base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stetho/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<Value> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(
            method = ?request.method,
            url = %url,
            params = %request.redacted_params(),
            "vendor request"
        );

        let mut builder = match request.method {
            Method::Get => self.client.get(&url).query(&request.params),
            Method::Post => self.client.post(&url).form(&request.params),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder.send()?;
        let http_status = response.status();
        let text = response.text()?;
        let reply: Value = match serde_json::from_str(&text) {
            Ok(reply) => reply,
            // A bare HTTP 401 still means the bearer token was refused.
            Err(_) if http_status == reqwest::StatusCode::UNAUTHORIZED => {
                return Err(Error::VendorApi {
                    action: request.action().to_string(),
                    status: INVALID_TOKEN_STATUS,
                    message: "unauthorized".into(),
                });
            },
            Err(e) => {
                return Err(Error::malformed(
                    request.action(),
                    format!("HTTP {http_status}: {e}"),
                ));
            },
        };
        trace!(
            action = request.action(),
            %http_status,
            status = ?reply.get("status"),
            "vendor reply"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::testing::ScriptedTransport, mockito::Matcher, serde_json::json};

    #[test]
    fn call_unwraps_body() {
        let transport = ScriptedTransport::new();
        transport.reply("list", json!({"status": 0, "body": {"series": []}}));
        let body = call(&transport, &ApiRequest::get("/v2/stetho").param("action", "list")).unwrap();
        assert_eq!(body, json!({"series": []}));
    }

    #[test]
    fn call_raises_on_nonzero_status() {
        let transport = ScriptedTransport::new();
        transport.reply("get", json!({"status": 293, "error": "invalid signal"}));
        let err = call(&transport, &ApiRequest::get("/v2/stetho").param("action", "get"))
            .unwrap_err();
        match err {
            Error::VendorApi {
                action,
                status,
                message,
            } => {
                assert_eq!(action, "get");
                assert_eq!(status, 293);
                assert_eq!(message, "invalid signal");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn call_rejects_envelope_without_status() {
        let transport = ScriptedTransport::new();
        transport.reply("list", json!({"body": {}}));
        let err = call(&transport, &ApiRequest::get("/v2/stetho").param("action", "list"))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn redacts_sensitive_params() {
        let req = ApiRequest::get("/v2/oauth2")
            .param("action", "requesttoken")
            .param("refresh_token", "r-123")
            .param("signature", "abcdef");
        let logged = req.redacted_params();
        assert!(logged.contains("action=requesttoken"));
        assert!(!logged.contains("r-123"));
        assert!(!logged.contains("abcdef"));
    }

    #[test]
    fn action_falls_back_to_path() {
        assert_eq!(ApiRequest::get("/v2/signature").action(), "/v2/signature");
    }

    #[test]
    fn http_get_sends_query_and_bearer() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/v2/stetho")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "list".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
            ]))
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":0,"body":{"series":[],"more":false}}"#)
            .create();

        let transport = HttpTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        let req = ApiRequest::get("/v2/stetho")
            .param("action", "list")
            .param("offset", 0)
            .bearer(Secret::new("tok-1".into()));
        let body = call(&transport, &req).unwrap();

        mock.assert();
        assert_eq!(body["more"], json!(false));
    }

    #[test]
    fn http_post_sends_form_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v2/user")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("action".into(), "activate".into()),
                Matcher::UrlEncoded("email".into(), "jane@example.com".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"status":0,"body":{"user":{"code":"c-1"}}}"#)
            .create();

        let transport = HttpTransport::new(format!("{}/", server.url()), Duration::from_secs(5))
            .unwrap();
        let req = ApiRequest::post("/v2/user")
            .param("action", "activate")
            .param("email", "jane@example.com");
        let body = call(&transport, &req).unwrap();

        mock.assert();
        assert_eq!(body["user"]["code"], json!("c-1"));
    }

    #[test]
    fn http_non_json_reply_is_malformed() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/v2/signature")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create();

        let transport = HttpTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = call(
            &transport,
            &ApiRequest::get("/v2/signature").param("action", "getnonce"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn http_bare_unauthorized_is_invalid_token() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/v2/stetho")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("Unauthorized")
            .create();

        let transport = HttpTransport::new(server.url(), Duration::from_secs(5)).unwrap();
        let err = call(
            &transport,
            &ApiRequest::get("/v2/stetho").param("action", "list"),
        )
        .unwrap_err();
        assert!(err.is_invalid_token());
    }
}
