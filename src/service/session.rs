use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::db::models::UserId;
use crate::db::store::SessionRepository;
use crate::error::PortalError;

/// Who is behind a request, as far as the session cookie tells.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Anonymous,
    Authenticated {
        user_id: UserId,
        expires_at: DateTime<Utc>,
    },
}

impl Identity {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated { user_id, .. } => Some(*user_id),
        }
    }
}

/// Opaque session token handed to the client. The value is never logged.
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Result<Self, PortalError> {
        let mut bytes = [0u8; 32];
        getrandom::getrandom(&mut bytes)
            .map_err(|e| PortalError::TokenGeneration(e.to_string()))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Create a server-side session for `user_id`, valid for `ttl` from `now`.
pub async fn issue<S>(
    store: &S,
    user_id: UserId,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<SessionToken, PortalError>
where
    S: SessionRepository + ?Sized,
{
    let token = SessionToken::generate()?;
    store
        .create_session(token.as_str(), user_id, now + ttl)
        .await?;
    Ok(token)
}

/// Map a cookie value to an identity. Missing, unknown and expired tokens are
/// anonymous; only storage failures are errors. The referenced user is not
/// checked for existence.
pub async fn resolve<S>(
    store: &S,
    token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Identity, PortalError>
where
    S: SessionRepository + ?Sized,
{
    let Some(token) = token.filter(|t| looks_like_token(t)) else {
        return Ok(Identity::Anonymous);
    };
    let Some(session) = store.find_session(token).await? else {
        return Ok(Identity::Anonymous);
    };
    if session.expires_at <= now {
        debug!(user_id = session.user_id, "session expired");
        store.delete_session(token).await?;
        return Ok(Identity::Anonymous);
    }
    Ok(Identity::Authenticated {
        user_id: session.user_id,
        expires_at: session.expires_at,
    })
}

pub async fn revoke<S>(store: &S, token: &str) -> Result<(), PortalError>
where
    S: SessionRepository + ?Sized,
{
    store.delete_session(token).await
}

fn looks_like_token(token: &str) -> bool {
    URL_SAFE_NO_PAD
        .decode(token)
        .map(|bytes| bytes.len() == 32)
        .unwrap_or(false)
}
