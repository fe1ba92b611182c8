use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Parses the role column written by the auth framework. Anything unknown is a plain user.
    pub fn from_column(role: Option<&str>) -> Self {
        match role {
            Some("admin") => Self::Admin,
            _ => Self::User,
        }
    }
}

/// A signed-in user as resolved from the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque user identifier issued by the auth framework.
    pub user: Box<str>,
    pub role: Role,
}

impl Session {
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}
