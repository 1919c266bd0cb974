use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Thin typed wrapper over the forum HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base, path));
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check(resp: Response) -> ClientResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.json::<ErrorBody>().await.ok().map(|b| b.error);
        tracing::debug!(%status, ?message, "API call rejected");
        Err(ClientError::from_status(status, message))
    }

    /// Decode a success body into `T`; anything else fails closed.
    async fn decode<T: DeserializeOwned>(resp: Response) -> ClientResult<T> {
        let bytes = Self::check(resp).await?.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::Validation(format!("unexpected response shape: {e}")))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> ClientResult<T> {
        let resp = self.request(Method::GET, path, token).send().await?;
        Self::decode(resp).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> ClientResult<T> {
        let resp = self.request(Method::POST, path, token).json(body).send().await?;
        Self::decode(resp).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> ClientResult<()> {
        let resp = self.request(Method::DELETE, path, token).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Sign-in URL; after OAuth the API redirects to `redirect` with `?token=`.
    pub fn login_url(&self, redirect: &str) -> String {
        format!(
            "{}/api/auth/github?redirect={}",
            self.base,
            urlencoding::encode(redirect)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_encodes_redirect() {
        let api = ApiClient::new("http://localhost:8080/");
        assert_eq!(api.base_url(), "http://localhost:8080");
        assert_eq!(
            api.login_url("http://localhost:3000/"),
            "http://localhost:8080/api/auth/github?redirect=http%3A%2F%2Flocalhost%3A3000%2F"
        );
    }
}
