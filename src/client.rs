/// Session Client
///
/// HTTP consumer of the session API. Protected calls carry the access
/// token; a 401 triggers exactly one rotation with the stored refresh token
/// and one retry. When the rotation itself is refused the local session is
/// dropped and the caller has to log in again.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug)]
pub enum ClientError {
    Http(reqwest::Error),
    Api {
        status: u16,
        code: String,
        message: String,
    },
    /// The refresh token was refused; local tokens have been cleared
    SessionExpired,
    NotLoggedIn,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Http(e) => write!(f, "HTTP error: {}", e),
            ClientError::Api {
                status,
                code,
                message,
            } => write!(f, "API error {} ({}): {}", status, code, message),
            ClientError::SessionExpired => write!(f, "Session expired, log in again"),
            ClientError::NotLoggedIn => write!(f, "Not logged in"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err)
    }
}

/// Tokens held by a logged-in client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Serialize)]
struct SignupBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct TokenBody<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupReply {
    user: User,
    token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginReply {
    token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshReply {
    access_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Mutex<Option<SessionTokens>>,
    /// Held across a rotation so concurrent 401s spend the refresh token once
    rotation: Mutex<()>,
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            tokens: Mutex::new(None),
            rotation: Mutex::new(()),
        }
    }

    /// Resume a session from previously stored tokens
    pub fn with_tokens(base_url: impl Into<String>, tokens: SessionTokens) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
            ..Self::new(base_url)
        }
    }

    pub async fn tokens(&self) -> Option<SessionTokens> {
        self.tokens.lock().await.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<User, ClientError> {
        let response = self
            .http
            .post(self.url("/users/signup"))
            .json(&SignupBody {
                name,
                email,
                password,
            })
            .send()
            .await?;

        let reply: SignupReply = expect_success(response).await?.json().await?;
        *self.tokens.lock().await = Some(SessionTokens {
            access_token: reply.token,
            refresh_token: reply.refresh_token,
        });

        Ok(reply.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url("/users/login"))
            .json(&LoginBody { email, password })
            .send()
            .await?;

        let reply: LoginReply = expect_success(response).await?.json().await?;
        *self.tokens.lock().await = Some(SessionTokens {
            access_token: reply.token,
            refresh_token: reply.refresh_token,
        });

        Ok(())
    }

    /// GET /users, rotating once on 401
    pub async fn list_users(&self) -> Result<Vec<User>, ClientError> {
        let tokens = self.tokens().await.ok_or(ClientError::NotLoggedIn)?;

        let mut response = self.get_users(&tokens.access_token).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!("Access token rejected, rotating once");
            let current = self.refresh_after_rejection(&tokens).await?;
            response = self.get_users(&current.access_token).await?;
        }

        Ok(expect_success(response).await?.json().await?)
    }

    /// Revoke the refresh token server-side and forget local tokens
    ///
    /// The server's answer is ignored; local state is cleared regardless.
    pub async fn logout(&self) {
        let tokens = self.tokens.lock().await.take();

        if let Some(tokens) = tokens {
            let result = self
                .http
                .post(self.url("/logout"))
                .json(&TokenBody {
                    token: &tokens.refresh_token,
                })
                .send()
                .await;

            if let Err(e) = result {
                tracing::warn!(error = %e, "Logout request failed");
            }
        }
    }

    async fn get_users(&self, access_token: &str) -> Result<reqwest::Response, ClientError> {
        Ok(self
            .http
            .get(self.url("/users"))
            .bearer_auth(access_token)
            .send()
            .await?)
    }

    /// Fresh tokens after `rejected` got a 401
    ///
    /// If another call already rotated while this one waited for the lock,
    /// its tokens are reused instead of spending the old refresh token again.
    async fn refresh_after_rejection(
        &self,
        rejected: &SessionTokens,
    ) -> Result<SessionTokens, ClientError> {
        let _rotation = self.rotation.lock().await;

        match self.tokens().await {
            None => Err(ClientError::SessionExpired),
            Some(current) if current.refresh_token != rejected.refresh_token => {
                tracing::debug!("Tokens already rotated by a concurrent call");
                Ok(current)
            }
            Some(_) => self.rotate(&rejected.refresh_token).await,
        }
    }

    async fn rotate(&self, refresh_token: &str) -> Result<SessionTokens, ClientError> {
        let response = self
            .http
            .post(self.url("/token"))
            .json(&TokenBody {
                token: refresh_token,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = response.status().as_u16(), "Token rotation refused");
            let mut tokens = self.tokens.lock().await;
            // A login that landed meanwhile keeps its tokens
            if tokens.as_ref().map(|t| t.refresh_token.as_str()) == Some(refresh_token) {
                *tokens = None;
            }
            return Err(ClientError::SessionExpired);
        }

        let reply: RefreshReply = response.json().await?;
        let rotated = SessionTokens {
            access_token: reply.access_token,
            refresh_token: reply.refresh_token,
        };
        *self.tokens.lock().await = Some(rotated.clone());

        Ok(rotated)
    }
}

/// Pass successful responses through, turn the rest into `ClientError::Api`
async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let (code, message) = match response.json::<ErrorBody>().await {
        Ok(body) => (body.code, body.error),
        Err(_) => ("UNKNOWN".to_string(), status.to_string()),
    };

    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}
