use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey(pub String);

impl SessionKey {
    /// Mints a key for a guest that has no session yet.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

/// The key that scopes personalization for one request.
///
/// Users and sessions are separate keyspaces in the interaction store; a
/// guest's session history is never folded into a user's history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum Identity {
    User(UserId),
    Session(SessionKey),
    Anonymous,
}

impl Identity {
    /// Resolves the caller-supplied credentials. An authenticated user wins
    /// over a session; blank session keys count as absent.
    pub fn resolve(user: Option<UserId>, session: Option<SessionKey>) -> Self {
        match (user, session) {
            (Some(user_id), _) => Self::User(user_id),
            (None, Some(session)) if !session.0.trim().is_empty() => Self::Session(session),
            _ => Self::Anonymous,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(user_id) => Some(*user_id),
            Self::Session(_) | Self::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Storage discriminator and key, `None` for anonymous callers.
    pub fn storage_key(&self) -> Option<(&'static str, String)> {
        match self {
            Self::User(user_id) => Some(("user", user_id.0.to_string())),
            Self::Session(session) => Some(("session", session.0.clone())),
            Self::Anonymous => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Identity, SessionKey, UserId};

    #[test]
    fn authenticated_user_takes_precedence_over_session() {
        let identity =
            Identity::resolve(Some(UserId(7)), Some(SessionKey("guest-abc".to_string())));
        assert_eq!(identity, Identity::User(UserId(7)));
    }

    #[test]
    fn missing_credentials_resolve_to_anonymous() {
        assert_eq!(Identity::resolve(None, None), Identity::Anonymous);
        assert_eq!(
            Identity::resolve(None, Some(SessionKey("   ".to_string()))),
            Identity::Anonymous
        );
    }

    #[test]
    fn user_and_session_keys_never_collide() {
        let user = Identity::User(UserId(42)).storage_key();
        let session = Identity::Session(SessionKey("42".to_string())).storage_key();
        assert_ne!(user, session);
        assert_eq!(Identity::Anonymous.storage_key(), None);
    }

    #[test]
    fn generated_session_keys_fit_session_column() {
        let first = SessionKey::generate();
        let second = SessionKey::generate();
        assert_eq!(first.0.len(), 32);
        assert_ne!(first, second);
    }
}
