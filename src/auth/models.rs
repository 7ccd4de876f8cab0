use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Represents a user whose bearer credential was verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Unique user identifier from the identity provider (`sub` claim).
    pub user_id: String,
    /// User email address, when the provider includes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Who is making a request.
///
/// Reads are allowed for anyone but see only published recipes when
/// anonymous; every mutation requires an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Caller {
    #[default]
    Anonymous,
    Authenticated(AuthenticatedUser),
}

impl Caller {
    /// An authenticated caller for in-process jobs that must see drafts.
    pub fn service(name: &str) -> Self {
        Caller::Authenticated(AuthenticatedUser {
            user_id: name.to_string(),
            email: None,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Caller::Authenticated(_))
    }

    /// Return the user, or an auth error for anonymous callers.
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        match self {
            Caller::Authenticated(user) => Ok(user),
            Caller::Anonymous => Err(AppError::Auth("Missing or invalid credential".into())),
        }
    }
}
