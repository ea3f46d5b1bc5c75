// Resource endpoint HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, bearer authorization, and
// unwrapping of the paginated `{ <field>: [...], total, page, pages }`
// envelope. Callers see typed records; the envelope is stripped here.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use super::Page;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for paginated collection endpoints.
pub struct ResourceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ResourceClient {
    /// Create a resource client from a `TransportConfig`.
    ///
    /// `base_url` is the API root (e.g. `http://127.0.0.1:5000`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a resource client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a full URL for a collection path: `{base}/{path}`.
    pub fn collection_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Fetch one page of a collection.
    ///
    /// Issues exactly one `GET {base}/{path}?page=N&per_page=M`. The records
    /// are read from the top-level `field` of the response body, in
    /// response order. Any non-2xx status is an [`Error::Endpoint`]; nothing
    /// is retried.
    pub async fn list_page<T: DeserializeOwned>(
        &self,
        path: &str,
        field: &str,
        page: u32,
        per_page: u32,
        bearer: Option<&SecretString>,
    ) -> Result<Page<T>, Error> {
        let url = self.collection_url(path)?;
        debug!(%url, page, per_page, "GET collection page");

        let mut req = self
            .http
            .get(url)
            .query(&[("page", page), ("per_page", per_page)]);
        if let Some(token) = bearer {
            req = req.bearer_auth(token.expose_secret());
        }

        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        trace!(status = status.as_u16(), bytes = body.len(), "collection response");

        if !status.is_success() {
            return Err(Error::Endpoint {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        parse_page(&body, field)
    }
}

/// Pull the records and pagination metadata out of a response body.
fn parse_page<T: DeserializeOwned>(body: &str, field: &str) -> Result<Page<T>, Error> {
    let deser_err = |message: String| Error::Deserialization {
        message,
        body: body.to_owned(),
    };

    let mut root: Value = serde_json::from_str(body).map_err(|e| deser_err(e.to_string()))?;
    let Some(obj) = root.as_object_mut() else {
        return Err(deser_err("response body is not a JSON object".into()));
    };

    let items = obj
        .remove(field)
        .ok_or_else(|| deser_err(format!("response has no '{field}' field")))?;
    let items: Vec<T> = serde_json::from_value(items).map_err(|e| deser_err(e.to_string()))?;

    let number = |key: &str| obj.get(key).and_then(Value::as_u64);

    Ok(Page {
        items,
        total: number("total"),
        page: number("page").and_then(|n| u32::try_from(n).ok()),
        pages: number("pages").and_then(|n| u32::try_from(n).ok()),
    })
}

/// The resource backend reports errors as `{"error": "..."}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.to_owned())
}
