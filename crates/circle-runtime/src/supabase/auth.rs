use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use circle_core::{
    CoreError, Credentials, Identity, IdentityProvider, Result, SessionResolver, SessionToken,
    SignUp, UserId,
};

use super::{SupabaseConfig, status_error, transport_error};

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Token grant; sign-up replies carry it only when confirmation is off
#[derive(Debug, Deserialize)]
struct AuthSession {
    access_token: String,
    user: AuthUser,
}

/// Error body; GoTrue versions disagree on the field name
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AuthErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg.or(self.error_description).or(self.message)
    }
}

fn identity(user: AuthUser, token: &str, fallback_email: &str) -> Result<Identity> {
    Ok(Identity {
        user_id: UserId::parse(user.id)?,
        email: user.email.unwrap_or_else(|| fallback_email.to_string()),
        access_token: SessionToken::from_string(token),
    })
}

/// Supabase Auth: resolves access tokens and runs email/password sign-in
pub struct SupabaseAuth {
    client: Client,
    config: SupabaseConfig,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig) -> Result<Self> {
        Ok(Self {
            client: config.client()?,
            config,
        })
    }

    async fn decode<T: for<'de> Deserialize<'de>>(response: Response, context: &str) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| CoreError::Storage(format!("{context}: invalid response body: {e}")))
    }

    async fn user(&self, token: &str) -> Result<Option<AuthUser>> {
        let response = self
            .client
            .get(self.config.auth_url("user"))
            .header("apikey", &self.config.service_role_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error(&e, "resolve session"))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!("Session token rejected by auth service");
                Ok(None)
            }
            status if status.is_success() => Self::decode(response, "resolve session").await.map(Some),
            status => Err(status_error(status, "resolve session")),
        }
    }
}

#[async_trait]
impl SessionResolver for SupabaseAuth {
    async fn resolve(&self, token: &str) -> Result<Option<UserId>> {
        self.user(token)
            .await?
            .map(|user| UserId::parse(user.id))
            .transpose()
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn sign_up(&self, credentials: &Credentials, confirm_redirect: &str) -> Result<SignUp> {
        credentials.validate_new()?;

        let response = self
            .client
            .post(self.config.auth_url("signup"))
            .query(&[("redirect_to", confirm_redirect)])
            .header("apikey", &self.config.service_role_key)
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| transport_error(&e, "sign up"))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            let body: AuthErrorBody = response.json().await.unwrap_or_default();
            let message = body.into_message().unwrap_or_else(|| "sign-up rejected".into());
            tracing::debug!(status = %status, message = %message, "Sign-up rejected");
            return Err(CoreError::InvalidInput(message));
        }
        if !status.is_success() {
            return Err(status_error(status, "sign up"));
        }

        // With email confirmation on, the reply is the bare user
        let body: serde_json::Value = Self::decode(response, "sign up").await?;
        match serde_json::from_value::<AuthSession>(body) {
            Ok(session) => {
                let identity = identity(session.user, &session.access_token, &credentials.email)?;
                tracing::info!(user_id = %identity.user_id, "Signed up");
                Ok(SignUp::Session(identity))
            }
            Err(_) => {
                tracing::info!("Sign-up pending email confirmation");
                Ok(SignUp::ConfirmationSent)
            }
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Option<Identity>> {
        let response = self
            .client
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.service_role_key)
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(|e| transport_error(&e, "sign in"))?;

        match response.status() {
            StatusCode::BAD_REQUEST => {
                tracing::debug!("Sign-in rejected by auth service");
                Ok(None)
            }
            status if status.is_success() => {
                let session: AuthSession = Self::decode(response, "sign in").await?;
                identity(session.user, &session.access_token, &credentials.email).map(Some)
            }
            status => Err(status_error(status, "sign in")),
        }
    }

    async fn identity(&self, access_token: &str) -> Result<Option<Identity>> {
        self.user(access_token)
            .await?
            .map(|user| identity(user, access_token, ""))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::mock::{self, MockUser};

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials::new(email, password).unwrap()
    }

    async fn auth() -> (SupabaseAuth, mock::Mock) {
        let (config, mock) = mock::start().await;
        mock.db().users.push(MockUser {
            id: "u-1".into(),
            email: "member@example.com".into(),
            password: "secret1".into(),
        });
        (SupabaseAuth::new(config).unwrap(), mock)
    }

    #[tokio::test]
    async fn test_resolve_token() {
        let (auth, _mock) = auth().await;
        assert_eq!(
            auth.resolve(&mock::token_for("u-1")).await.unwrap(),
            Some(UserId::parse("u-1").unwrap())
        );
        assert!(auth.resolve("forged").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in() {
        let (auth, _mock) = auth().await;
        let identity = auth
            .sign_in(&creds("member@example.com", "secret1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.user_id.as_str(), "u-1");
        assert_eq!(identity.access_token.as_str(), mock::token_for("u-1"));

        assert!(auth
            .sign_in(&creds("member@example.com", "wrong!"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_sign_up_with_confirmation() {
        let (auth, mock) = auth().await;
        let outcome = auth
            .sign_up(&creds("new@example.com", "secret1"), "http://localhost:3000/auth/callback")
            .await
            .unwrap();
        assert!(matches!(outcome, SignUp::ConfirmationSent));
        assert_eq!(
            mock.db().last_redirect.as_deref(),
            Some("http://localhost:3000/auth/callback")
        );
    }

    #[tokio::test]
    async fn test_sign_up_autoconfirmed() {
        let (auth, mock) = auth().await;
        mock.db().autoconfirm = true;
        let SignUp::Session(identity) = auth
            .sign_up(&creds("new@example.com", "secret1"), "")
            .await
            .unwrap()
        else {
            panic!("autoconfirmed sign-up returns a session");
        };
        assert_eq!(identity.email, "new@example.com");

        let resolved = auth.identity(identity.access_token.as_str()).await.unwrap().unwrap();
        assert_eq!(resolved.user_id, identity.user_id);
    }

    #[tokio::test]
    async fn test_sign_up_rejections() {
        let (auth, mock) = auth().await;
        let err = auth
            .sign_up(&creds("member@example.com", "secret1"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(ref m) if m == "User already registered"));

        let registered = mock.db().users.len();
        assert!(matches!(
            auth.sign_up(&creds("short@example.com", "12345"), "").await,
            Err(CoreError::InvalidInput(_))
        ));
        assert_eq!(mock.db().users.len(), registered);
    }
}
