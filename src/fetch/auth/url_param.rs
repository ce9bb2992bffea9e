use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::Request;

/// An [`HttpClient`] wrapper that passes an API key in the query string,
/// e.g. `?api_key=...` or `?token=...`. Any query the feed URL already has is
/// kept.
pub struct UrlParam<C> {
    inner: C,
    param_name: String,
    key: String,
}

impl<C> UrlParam<C> {
    pub fn new(inner: C, param_name: &str, key: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(!param_name.trim().is_empty(), "API key parameter name is empty");
        Ok(Self {
            inner,
            param_name: param_name.trim().to_string(),
            key: key.to_string(),
        })
    }

    fn decorate(&self, req: &mut Request) {
        req.url_mut()
            .query_pairs_mut()
            .append_pair(&self.param_name, &self.key);
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for UrlParam<C> {
    async fn execute(&self, mut req: Request) -> reqwest::Result<reqwest::Response> {
        self.decorate(&mut req);
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;

    fn get(url: &str) -> Request {
        Request::new(reqwest::Method::GET, url.parse().unwrap())
    }

    #[test]
    fn test_appends_to_existing_query() {
        let client = UrlParam::new(BasicClient::new(), "api_key", "s3cr3t&x").unwrap();
        let mut req = get("https://example.com/gtfs.zip?agency=1");
        client.decorate(&mut req);
        assert_eq!(
            req.url().as_str(),
            "https://example.com/gtfs.zip?agency=1&api_key=s3cr3t%26x"
        );
    }

    #[test]
    fn test_rejects_blank_name() {
        assert!(UrlParam::new(BasicClient::new(), "  ", "k").is_err());
    }
}
