use std::fmt::Debug;

use anyhow::{Context, Result};
use async_trait::async_trait;
use http::{Request, Response};

/// Generic HTTP client.
///
/// A trait is used here so to facilitate native HTTP/TLS when compiled for
/// mobile applications, and canned responses in tests.
#[async_trait]
pub trait AsyncHttpClient: Debug {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

#[derive(Debug)]
pub struct ReqwestClient(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestClient {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("unable to build http_client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let response = self
            .0
            .execute(request.try_into().context("unable to convert request")?)
            .await
            .context("http request failed")?;

        let mut builder = Response::builder().status(response.status());

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        builder
            .body(
                response
                    .bytes()
                    .await
                    .context("failed to extract response body")?
                    .to_vec(),
            )
            .context("unable to construct response")
    }
}

#[cfg(test)]
mod test {
    use http::Response;

    #[test]
    fn debug() {
        Response::builder().headers_mut().unwrap();
    }
}
