use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Parses the body of a 2xx response, anything else becomes `Error::Http`.
    pub fn success_json(&self, url: &str) -> Result<Value> {
        if !self.is_success() {
            return Err(Error::Http {
                status: self.status,
                url: url.to_string(),
            });
        }
        self.json()
    }
}

/// Blocking request/response transport. Implementations enforce their own
/// per-request timeout; a timeout surfaces as `Error::Transport`.
pub trait HttpTransport: Send + Sync {
    fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<HttpResponse>;

    fn get(&self, url: &str) -> Result<HttpResponse> {
        self.request(Method::Get, url, None)
    }

    fn post(&self, url: &str, body: &Value) -> Result<HttpResponse> {
        self.request(Method::Post, url, Some(body))
    }

    fn put(&self, url: &str, body: &Value) -> Result<HttpResponse> {
        self.request(Method::Put, url, Some(body))
    }
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<HttpResponse> {
        let builder = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
        };
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder
            .send()
            .map_err(|e| Error::Transport(format!("{} {url} failed: {e}", method.as_str())))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| Error::Transport(format!("Failed to read response from {url}: {e}")))?;

        log::trace!(method = method.as_str(), url = url, status = status; "[http] Request complete");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_status_becomes_http_error() {
        let response = HttpResponse {
            status: 403,
            body: String::new(),
        };
        match response.success_json("http://h/api") {
            Err(Error::Http { status, url }) => {
                assert_eq!(status, 403);
                assert_eq!(url, "http://h/api");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn success_body_is_parsed() {
        let response = HttpResponse {
            status: 200,
            body: r#"{"ver":"0.14"}"#.to_string(),
        };
        assert_eq!(response.success_json("u").unwrap()["ver"], "0.14");
    }
}
