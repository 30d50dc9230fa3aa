//! Datadog API client
//!
//! Thin request builder over [`HttpTransport`]: it knows the site-derived
//! base URL, the authentication headers and the call-source header each
//! template identifies itself with. Endpoint paths and bodies belong to the
//! resources that use them.

use serde::Serialize;

use crate::errors::{Error, Result};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json; charset=utf-8";

/// API and application key pair
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub app_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("app_key", &"<redacted>")
            .finish()
    }
}

/// Map an internal datacenter name to its public site
pub fn site_for_datacenter(datacenter: &str) -> Result<&'static str> {
    match datacenter {
        "us1.prod.dog" => Ok("datadoghq.com"),
        "eu1.prod.dog" => Ok("datadoghq.eu"),
        "us3.prod.dog" => Ok("us3.datadoghq.com"),
        "us5.prod.dog" => Ok("us5.datadoghq.com"),
        "us1.fed.dog" => Ok("ddog-gov.com"),
        other => Err(Error::UnknownDatacenter(other.to_string())),
    }
}

pub struct DatadogClient<'a> {
    transport: &'a dyn HttpTransport,
    base_url: String,
    headers: Vec<(String, String)>,
}

impl<'a> DatadogClient<'a> {
    /// Client for `https://api.{site}`
    pub fn for_site(transport: &'a dyn HttpTransport, site: &str) -> Self {
        Self::with_base_url(transport, format!("https://api.{}", site.trim_end_matches('/')))
    }

    /// Create with explicit base URL
    pub fn with_base_url(transport: &'a dyn HttpTransport, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            headers: Vec::new(),
        }
    }

    pub fn authenticated(mut self, credentials: &Credentials) -> Self {
        self.headers
            .push(("DD-API-KEY".to_string(), credentials.api_key.clone()));
        self.headers
            .push(("DD-APPLICATION-KEY".to_string(), credentials.app_key.clone()));
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// Header naming the template that issued the call
    pub fn call_source(self, source: &str) -> Self {
        self.header("Dd-Aws-Api-Call-Source", source)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse> {
        self.transport.execute(self.request(Method::Get, path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<HttpResponse> {
        self.transport.execute(self.request(Method::Delete, path)).await
    }

    /// DELETE carrying a JSON body, as the v1 endpoint expects
    pub async fn delete_json<B: Serialize>(&self, path: &str, body: &B) -> Result<HttpResponse> {
        self.send_json(Method::Delete, path, body, JSON_CONTENT_TYPE)
            .await
    }

    pub async fn send_json<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        content_type: &str,
    ) -> Result<HttpResponse> {
        let request = self
            .request(method, path)
            .header("Content-Type", content_type)
            .body(serde_json::to_string(body)?);
        self.transport.execute(request).await
    }

    fn request(&self, method: Method, path: &str) -> HttpRequest {
        self.headers
            .iter()
            .fold(HttpRequest::new(method, self.url(path)), |request, (name, value)| {
                request.header(name.as_str(), value.as_str())
            })
    }
}
