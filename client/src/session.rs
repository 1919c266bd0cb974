use hive_shared::Profile;
use reqwest::Url;

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};

/// Who is signed in, passed explicitly to everything that acts on their behalf.
///
/// Starts signed out. Signing in stores the bearer token and the profile
/// fetched with it; signing out drops both.
#[derive(Debug, Clone)]
pub struct Session {
    api: ApiClient,
    token: Option<String>,
    user: Option<Profile>,
}

/// The `token` query parameter the API appends to the post-login redirect.
pub fn token_from_callback(callback_url: &str) -> Option<String> {
    let url = Url::parse(callback_url).ok()?;
    let token = url
        .query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned());
    token.filter(|t| !t.is_empty())
}

impl Session {
    pub fn signed_out(api: ApiClient) -> Self {
        Self {
            api,
            token: None,
            user: None,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn login_url(&self, redirect: &str) -> String {
        self.api.login_url(redirect)
    }

    /// Finish OAuth sign-in from the URL the browser landed on.
    pub async fn complete_sign_in(&mut self, callback_url: &str) -> ClientResult<&Profile> {
        let token = token_from_callback(callback_url).ok_or(ClientError::Unauthenticated)?;
        self.restore(token).await
    }

    /// Adopt `token` if the API accepts it. A rejected token signs out; any
    /// other failure leaves the current session as it was.
    pub async fn restore(&mut self, token: String) -> ClientResult<&Profile> {
        let fetched = self.api.get::<Profile>("/api/auth/me", Some(&token)).await;
        match fetched {
            Ok(profile) => {
                tracing::info!(user_id = profile.id, username = %profile.username, "signed in");
                self.token = Some(token);
                Ok(self.user.insert(profile))
            }
            Err(ClientError::Unauthenticated) => {
                tracing::warn!("stored token rejected, signing out");
                self.sign_out();
                Err(ClientError::Unauthenticated)
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not verify token, keeping session");
                Err(err)
            }
        }
    }

    pub fn sign_out(&mut self) {
        if let Some(user) = self.user.take() {
            tracing::info!(user_id = user.id, "signed out");
        }
        self.token = None;
    }

    pub fn user(&self) -> Option<&Profile> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    pub fn require_user(&self) -> ClientResult<&Profile> {
        match (&self.token, &self.user) {
            (Some(_), Some(user)) => Ok(user),
            _ => Err(ClientError::Unauthenticated),
        }
    }

    pub(crate) fn require_token(&self) -> ClientResult<&str> {
        self.require_user()?;
        self.token().ok_or(ClientError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_token_from_callback_url() {
        assert_eq!(
            token_from_callback("http://localhost:3000/?token=abc.def.ghi"),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(
            token_from_callback("http://localhost:3000/threads?x=1&token=t"),
            Some("t".to_string())
        );
        assert_eq!(token_from_callback("http://localhost:3000/?token="), None);
        assert_eq!(token_from_callback("http://localhost:3000/"), None);
        assert_eq!(token_from_callback("not a url"), None);
    }

    #[test]
    fn new_session_is_signed_out() {
        let session = Session::signed_out(ApiClient::new("http://localhost:8080"));
        assert!(!session.is_signed_in());
        assert!(matches!(session.require_user(), Err(ClientError::Unauthenticated)));
    }

    #[tokio::test]
    async fn callback_without_token_stays_signed_out() {
        let mut session = Session::signed_out(ApiClient::new("http://localhost:8080"));
        let err = session.complete_sign_in("http://localhost:3000/").await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
        assert!(session.user().is_none());
    }
}
