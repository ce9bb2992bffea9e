use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that sends an API key as an HTTP header.
///
/// Agencies differ on the header they expect (`Authorization`, `x-api-key`,
/// `apikey`), so the name is supplied by the caller. Both parts are validated
/// up front so that a bad key surfaces before any request is built.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: &str, key: &str) -> anyhow::Result<Self> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes())?;
        let mut value = HeaderValue::from_str(key)?;
        value.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            value,
        })
    }

    fn decorate(&self, req: &mut reqwest::Request) {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
    }

    /// Convenience constructor for `Authorization: Bearer <key>`.
    pub fn bearer(inner: C, key: &str) -> anyhow::Result<Self> {
        Self::new(inner, "Authorization", &format!("Bearer {key}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.decorate(&mut req);
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;

    #[test]
    fn test_rejects_invalid_header_name() {
        assert!(ApiKey::new(BasicClient::new(), "bad header", "k").is_err());
    }

    #[test]
    fn test_header_is_set_and_sensitive() {
        let client = ApiKey::new(BasicClient::new(), "x-api-key", "abc").unwrap();
        let mut req = reqwest::Request::new(
            reqwest::Method::GET,
            "https://example.com/gtfs.zip".parse().unwrap(),
        );
        client.decorate(&mut req);
        let value = req.headers().get("x-api-key").unwrap();
        assert_eq!(value.to_str().unwrap(), "abc");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_bearer_prefixes_key() {
        let client = ApiKey::bearer(BasicClient::new(), "secret").unwrap();
        assert_eq!(client.header_name.as_str(), "authorization");
        assert_eq!(client.value.to_str().unwrap(), "Bearer secret");
    }
}
