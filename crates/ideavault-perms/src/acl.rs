//! ACL entries and grant requests.
//!
//! Access is expressed as capability entries. Each entry ties a subject to
//! one idea, one object type and one permission. Only `Idea`/`View` entries
//! carry key material; everything else is a pure capability flag.

use serde::{Deserialize, Serialize};

use ideavault_core::{AclEntryId, IdeaId, ObjectType, Permission, UserId};

use crate::error::{PermsError, Result};
use crate::wrap::WrappedKey;

/// A single capability (object type + permission), independent of who holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Grant {
    pub object_type: ObjectType,
    pub permission: Permission,
}

impl Grant {
    pub const fn new(object_type: ObjectType, permission: Permission) -> Self {
        Self {
            object_type,
            permission,
        }
    }

    /// Read access to the document content.
    pub const fn view() -> Self {
        Self::new(ObjectType::Idea, Permission::View)
    }

    /// Integrity verification without content.
    pub const fn verify() -> Self {
        Self::new(ObjectType::Idea, Permission::Verify)
    }

    /// Whether entries with this grant must carry a wrapped document key.
    pub fn requires_key(&self) -> bool {
        self.object_type == ObjectType::Idea && self.permission == Permission::View
    }
}

/// Entries every owner holds on each of their own idea versions.
pub const OWNER_GRANTS: [Grant; 5] = [
    Grant::new(ObjectType::Idea, Permission::View),
    Grant::new(ObjectType::Idea, Permission::Verify),
    Grant::new(ObjectType::Comment, Permission::View),
    Grant::new(ObjectType::Comment, Permission::Post),
    Grant::new(ObjectType::AuditLog, Permission::View),
];

/// Uniqueness key of an ACL entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AclKey {
    pub subject: UserId,
    pub object: IdeaId,
    pub grant: Grant,
}

/// A persisted capability grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub id: AclEntryId,
    pub subject: UserId,
    pub object: IdeaId,
    pub object_type: ObjectType,
    pub permission: Permission,
    /// Document key wrapped for `subject`. Present exactly on `Idea`/`View` entries.
    pub wrapped_key: Option<WrappedKey>,
}

impl AclEntry {
    /// Create an entry with a fresh identifier.
    pub fn new(subject: UserId, object: IdeaId, grant: Grant, wrapped_key: Option<WrappedKey>) -> Self {
        Self {
            id: AclEntryId::new(),
            subject,
            object,
            object_type: grant.object_type,
            permission: grant.permission,
            wrapped_key,
        }
    }

    pub fn grant(&self) -> Grant {
        Grant::new(self.object_type, self.permission)
    }

    pub fn key(&self) -> AclKey {
        AclKey {
            subject: self.subject,
            object: self.object,
            grant: self.grant(),
        }
    }

    /// Check the key-carrying rules.
    ///
    /// `Verify` (and every non-`Idea`) entry must not carry a key. A keyless
    /// `Idea`/`View` entry is tolerated here since stores may hold one from
    /// an interrupted grant; the evaluator downgrades it to verify-only.
    pub fn validate(&self) -> Result<()> {
        if self.wrapped_key.is_some() && !self.grant().requires_key() {
            return Err(PermsError::InvalidGrant(format!(
                "{}/{} entry must not carry a wrapped key",
                self.object_type, self.permission
            )));
        }
        Ok(())
    }
}

/// A collaborator requested by email, as supplied by the uploader or granter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorRequest {
    pub email: String,
    pub grants: Vec<Grant>,
}

impl CollaboratorRequest {
    pub fn new(email: impl Into<String>, grants: impl IntoIterator<Item = Grant>) -> Self {
        Self {
            email: email.into(),
            grants: grants.into_iter().collect(),
        }
    }

    /// Reject requests with no usable email or no grants.
    pub fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(PermsError::InvalidGrant(format!(
                "collaborator email {:?} is not an email address",
                self.email
            )));
        }
        if self.grants.is_empty() {
            return Err(PermsError::InvalidGrant(format!(
                "collaborator {} has no permissions",
                email
            )));
        }
        Ok(())
    }
}
