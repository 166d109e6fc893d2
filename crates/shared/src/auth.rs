//! Authentication types carried in bearer tokens.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Privilege level granted to a user by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    /// Regular parent account.
    #[default]
    Standard,
    /// Platform administrator.
    Admin,
}

impl Privilege {
    /// Returns true for administrators.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Returns the wire name of the privilege.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "standard_user" => Ok(Self::Standard),
            "admin" | "admin_user" => Ok(Self::Admin),
            other => Err(format!("unknown privilege: {other}")),
        }
    }
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// Privilege of the subject.
    #[serde(default)]
    pub privilege: Privilege,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a user.
    #[must_use]
    pub fn new(user_id: Uuid, privilege: Privilege, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            privilege,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("standard", Privilege::Standard)]
    #[case("ADMIN", Privilege::Admin)]
    #[case("admin_user", Privilege::Admin)]
    #[case("STANDARD_USER", Privilege::Standard)]
    fn test_privilege_from_str(#[case] input: &str, #[case] expected: Privilege) {
        assert_eq!(input.parse::<Privilege>().unwrap(), expected);
    }

    #[test]
    fn test_privilege_rejects_unknown() {
        assert!("root".parse::<Privilege>().is_err());
    }

    #[test]
    fn test_claims_missing_privilege_defaults_to_standard() {
        let json = format!(
            r#"{{"sub":"{}","iat":1,"exp":2}}"#,
            Uuid::nil()
        );
        let claims: Claims = serde_json::from_str(&json).unwrap();
        assert_eq!(claims.privilege, Privilege::Standard);
    }
}
