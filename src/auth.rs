//! Identity collaborator: a small user directory with two roles.
//!
//! This is deliberately not real security (no hashing, no sessions); it
//! exists so operations can record who acted and so front ends can gate
//! the mutating commands on the admin role.

use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// One directory entry. The password deserializes from the users file but
/// is never written back out.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    #[serde(deserialize_with = "deserialize_password")]
    pub password: SecretString,
    pub role: Role,
    pub display: String,
}

fn deserialize_password<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::new(s.into()))
}

/// Who is acting, passed into every registry operation. The registry only
/// records the user; role checks belong to the caller.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: String,
    pub role: Role,
}

impl RequestContext {
    pub fn new(user: impl Into<String>, role: Role) -> Self {
        Self {
            user: user.into(),
            role,
        }
    }
}

/// A verified login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: String,
    pub role: Role,
    pub display: String,
}

impl Session {
    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.user.clone(), self.role)
    }
}

#[derive(Debug)]
pub struct UserDirectory {
    users: BTreeMap<String, UserEntry>,
}

impl UserDirectory {
    /// Loads `users.json` when present and readable; anything else falls
    /// back to the built-in defaults.
    pub fn load(path: &Path) -> Self {
        if path.exists()
            && let Ok(content) = std::fs::read_to_string(path)
            && let Ok(users) = serde_json::from_str::<BTreeMap<String, UserEntry>>(&content)
            && !users.is_empty()
        {
            return Self { users };
        }
        Self::default()
    }

    /// Case-sensitive name and password check.
    pub fn login(&self, user: &str, password: &str) -> Option<Session> {
        let entry = self.users.get(user)?;
        if entry.password.expose_secret() == password {
            Some(Session {
                user: user.to_string(),
                role: entry.role,
                display: entry.display.clone(),
            })
        } else {
            None
        }
    }

    /// Role lookup by user name, for callers that trust their channel
    /// (the CLI runs as whoever invoked it).
    pub fn role_of(&self, user: &str) -> Option<Role> {
        self.users.get(user).map(|e| e.role)
    }

    pub fn display_of(&self, user: &str) -> Option<&str> {
        self.users.get(user).map(|e| e.display.as_str())
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        let mut users = BTreeMap::new();
        users.insert(
            "admin".to_string(),
            UserEntry {
                password: SecretString::new("admin123".to_string().into()),
                role: Role::Admin,
                display: "管理者".to_string(),
            },
        );
        users.insert(
            "guest".to_string(),
            UserEntry {
                password: SecretString::new("guest".to_string().into()),
                role: Role::User,
                display: "一般".to_string(),
            },
        );
        Self { users }
    }
}
