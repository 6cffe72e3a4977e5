use serde::{Deserialize, Serialize, Serializer};

use crate::types::UserId;

/// An authenticated application user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
}

impl UserAccount {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

/// The caller of a request, as seen by the application.
///
/// Serializes to `{"is_anonymous": true}` or
/// `{"is_anonymous": false, "id": 1, "username": "alice"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdentity {
    Anonymous,
    Authenticated(UserAccount),
}

impl UserIdentity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    pub fn id(&self) -> Option<UserId> {
        self.account().map(|a| a.id)
    }

    pub fn username(&self) -> Option<&str> {
        self.account().map(|a| a.username.as_str())
    }

    pub fn account(&self) -> Option<&UserAccount> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(account) => Some(account),
        }
    }
}

impl From<UserAccount> for UserIdentity {
    fn from(account: UserAccount) -> Self {
        Self::Authenticated(account)
    }
}

#[derive(Serialize)]
struct IdentityView<'a> {
    is_anonymous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

impl Serialize for UserIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        IdentityView {
            is_anonymous: self.is_anonymous(),
            id: self.id(),
            username: self.username(),
        }
        .serialize(serializer)
    }
}
