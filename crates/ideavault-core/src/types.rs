//! Strong type definitions for IdeaVault.
//!
//! All identifiers are newtypes to prevent misuse at compile time: an
//! `IdeaId` can never be passed where a `UserId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! record_id {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Allocate a new time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            /// Get the raw bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Parse from its string form, rejecting anything that is not an identifier.
            pub fn parse(s: &str) -> Result<Self, CoreError> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| CoreError::InvalidIdentifier {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

record_id!(
    /// Identifier of a registered user.
    UserId,
    "user"
);

record_id!(
    /// Identifier of one version of an idea (document).
    IdeaId,
    "idea"
);

record_id!(
    /// Identifier of a single ACL entry.
    AclEntryId,
    "acl entry"
);

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Owner,
    Viewer,
    Admin,
    Verifier,
}

/// The sub-resource class an ACL entry is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectType {
    /// The document itself.
    Idea,
    /// Comments attached to the document.
    Comment,
    /// The document's audit trail.
    AuditLog,
}

/// A capability within an object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    /// Read access. On `ObjectType::Idea` this carries a wrapped document key.
    View,
    /// Integrity verification without content disclosure.
    Verify,
    Post,
    Share,
    Revoke,
}

macro_rules! str_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Stable string form, as persisted.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($ty::$variant),)+
                    other => Err(CoreError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

str_enum!(Role, "role", {
    Owner => "OWNER",
    Viewer => "VIEWER",
    Admin => "ADMIN",
    Verifier => "VERIFIER",
});

str_enum!(ObjectType, "object type", {
    Idea => "Idea",
    Comment => "Comment",
    AuditLog => "AuditLog",
});

str_enum!(Permission, "permission", {
    View => "VIEW",
    Verify => "VERIFY",
    Post => "POST",
    Share => "SHARE",
    Revoke => "REVOKE",
});

/// An authenticated requester, as resolved by the (external) token check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subject {
    pub id: UserId,
    pub role: Role,
}

impl Subject {
    pub const fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parse_roundtrip() {
        let id = IdeaId::new();
        let recovered: IdeaId = id.to_string().parse().unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_id_parse_rejects_garbage() {
        let err = UserId::parse("not-an-id").unwrap_err();
        assert!(matches!(err, CoreError::InvalidIdentifier { kind: "user", .. }));
    }

    #[test]
    fn test_ids_are_time_ordered() {
        let a = AclEntryId::new();
        let b = AclEntryId::new();
        assert!(a <= b);
    }

    #[test]
    fn test_id_debug() {
        let id = UserId::from_bytes([0xcd; 16]);
        assert!(format!("{:?}", id).starts_with("UserId("));
    }

    #[test]
    fn test_permission_strings() {
        assert_eq!(Permission::View.as_str(), "VIEW");
        assert_eq!("VERIFY".parse::<Permission>().unwrap(), Permission::Verify);
        assert!("view".parse::<Permission>().is_err());
    }

    #[test]
    fn test_object_type_and_role_strings() {
        assert_eq!("AuditLog".parse::<ObjectType>().unwrap(), ObjectType::AuditLog);
        assert_eq!(Role::Verifier.to_string(), "VERIFIER");
        assert!("ROOT".parse::<Role>().is_err());
    }

    #[test]
    fn test_id_serde_json() {
        let id = IdeaId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: IdeaId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
