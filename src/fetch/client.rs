use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes a prepared request. Wrappers implement this to decorate requests
/// before delegating to an inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Lets a client picked at runtime (`Box<dyn HttpClient>`) be wrapped or
/// passed wherever a concrete client is expected.
#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Box<C> {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        (**self).execute(req).await
    }
}
