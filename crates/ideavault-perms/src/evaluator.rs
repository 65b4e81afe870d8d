//! Access evaluation.
//!
//! Access is computed fresh on every request from the idea's owner and its
//! current ACL entries. Nothing here is cached between requests.

use std::collections::HashMap;

use tracing::debug;

use ideavault_core::{IdeaId, ObjectType, Permission, Subject, UserId};

use crate::acl::{AclEntry, Grant};
use crate::wrap::WrappedKey;

/// Outcome of evaluating a subject against one idea.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Admin role on an idea it does not own. Every sub-resource capability,
    /// but content is only readable with an `Idea`/`View` key of its own.
    Administrator { wrapped_key: Option<WrappedKey> },
    /// The idea's owner.
    Owner,
    /// `Idea`/`View` with a wrapped key.
    ViewGrant { wrapped_key: WrappedKey },
    /// `Idea`/`Verify`, or an `Idea`/`View` entry missing its key.
    VerifyOnly,
    NoAccess,
}

impl Access {
    pub fn is_denied(&self) -> bool {
        matches!(self, Access::NoAccess)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Access::Administrator { .. } => "administrator",
            Access::Owner => "owner",
            Access::ViewGrant { .. } => "view",
            Access::VerifyOnly => "verify-only",
            Access::NoAccess => "none",
        }
    }
}

/// Entries of one idea, indexed by holder and capability.
#[derive(Debug, Default)]
pub struct AclIndex<'a> {
    by_grant: HashMap<(UserId, Grant), &'a AclEntry>,
}

impl<'a> AclIndex<'a> {
    /// Index the entries that apply to `object`. Entries for other ideas are skipped.
    pub fn new(object: IdeaId, entries: &'a [AclEntry]) -> Self {
        let by_grant = entries
            .iter()
            .filter(|e| e.object == object)
            .map(|e| ((e.subject, e.grant()), e))
            .collect();
        Self { by_grant }
    }

    pub fn get(&self, subject: UserId, grant: Grant) -> Option<&'a AclEntry> {
        self.by_grant.get(&(subject, grant)).copied()
    }

    pub fn has(&self, subject: UserId, grant: Grant) -> bool {
        self.by_grant.contains_key(&(subject, grant))
    }
}

/// Whether `subject` holds owner authority (grant, revoke, list, new
/// versions) over an idea owned by `owner`.
///
/// Only the owner does. The admin role never confers it, since owner
/// authority is what releases the owner's document key.
pub fn is_owner(subject: &Subject, owner: UserId) -> bool {
    subject.id == owner
}

/// Evaluate what `subject` may do with the idea owned by `owner`.
///
/// Rules apply in order: ownership, admin role, a keyed view grant, a
/// verify grant (or keyless view), and finally no access.
pub fn evaluate(subject: &Subject, object: IdeaId, owner: UserId, entries: &[AclEntry]) -> Access {
    let index = AclIndex::new(object, entries);
    let access = classify(subject, owner, &index);

    debug!(subject = %subject.id, idea = %object, access = access.label(), "evaluated access");
    access
}

/// Whether `subject` holds `permission` on `object_type` of the idea.
///
/// Owners and admins hold every capability on the idea.
pub fn has_capability(
    subject: &Subject,
    object: IdeaId,
    owner: UserId,
    entries: &[AclEntry],
    object_type: ObjectType,
    permission: Permission,
) -> bool {
    let index = AclIndex::new(object, entries);
    match classify(subject, owner, &index) {
        Access::Owner | Access::Administrator { .. } => true,
        _ => index.has(subject.id, Grant::new(object_type, permission)),
    }
}

fn classify(subject: &Subject, owner: UserId, index: &AclIndex<'_>) -> Access {
    if is_owner(subject, owner) {
        return Access::Owner;
    }
    let view = index.get(subject.id, Grant::view());
    if subject.is_admin() {
        return Access::Administrator {
            wrapped_key: view.and_then(|e| e.wrapped_key.clone()),
        };
    }
    match view {
        Some(AclEntry {
            wrapped_key: Some(key),
            ..
        }) => Access::ViewGrant {
            wrapped_key: key.clone(),
        },
        Some(_) => Access::VerifyOnly,
        None if index.has(subject.id, Grant::verify()) => Access::VerifyOnly,
        None => Access::NoAccess,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{EncryptionKey, X25519StaticSecret};
    use ideavault_core::Role;

    struct Doc {
        id: IdeaId,
        owner: UserId,
        entries: Vec<AclEntry>,
    }

    impl Doc {
        fn new() -> Self {
            Self {
                id: IdeaId::new(),
                owner: UserId::new(),
                entries: Vec::new(),
            }
        }

        fn grant(&mut self, subject: UserId, grant: Grant, keyed: bool) {
            let key = keyed.then(|| {
                let secret = X25519StaticSecret::generate();
                WrappedKey::wrap(&EncryptionKey::generate(), &secret.public_key(), self.id.as_bytes())
                    .unwrap()
            });
            self.entries.push(AclEntry::new(subject, self.id, grant, key));
        }

        fn eval(&self, subject: Subject) -> Access {
            evaluate(&subject, self.id, self.owner, &self.entries)
        }
    }

    fn viewer() -> Subject {
        Subject::new(UserId::new(), Role::Viewer)
    }

    #[test]
    fn test_owner_needs_no_entries() {
        let doc = Doc::new();
        assert_eq!(doc.eval(Subject::new(doc.owner, Role::Owner)), Access::Owner);
    }

    #[test]
    fn test_view_grant_with_key() {
        let mut doc = Doc::new();
        let bob = viewer();
        doc.grant(bob.id, Grant::view(), true);

        assert!(matches!(doc.eval(bob), Access::ViewGrant { .. }));
    }

    #[test]
    fn test_verify_grant_is_verify_only() {
        let mut doc = Doc::new();
        let carol = viewer();
        doc.grant(carol.id, Grant::verify(), false);

        assert_eq!(doc.eval(carol), Access::VerifyOnly);
    }

    #[test]
    fn test_keyless_view_downgrades_to_verify_only() {
        let mut doc = Doc::new();
        let bob = viewer();
        doc.grant(bob.id, Grant::view(), false);

        assert_eq!(doc.eval(bob), Access::VerifyOnly);
    }

    #[test]
    fn test_no_entry_is_no_access() {
        let mut doc = Doc::new();
        doc.grant(UserId::new(), Grant::view(), true);

        assert!(doc.eval(viewer()).is_denied());
    }

    #[test]
    fn test_comment_view_does_not_grant_content() {
        let mut doc = Doc::new();
        let bob = viewer();
        doc.grant(bob.id, Grant::new(ObjectType::Comment, Permission::View), false);

        assert_eq!(doc.eval(bob), Access::NoAccess);
    }

    #[test]
    fn test_entries_for_other_ideas_are_ignored() {
        let mut doc = Doc::new();
        let bob = viewer();
        doc.grant(bob.id, Grant::view(), true);
        doc.id = IdeaId::new();

        assert_eq!(doc.eval(bob), Access::NoAccess);
    }

    #[test]
    fn test_admin_bypasses_acl() {
        let mut doc = Doc::new();
        let admin = Subject::new(UserId::new(), Role::Admin);

        assert_eq!(doc.eval(admin), Access::Administrator { wrapped_key: None });
        assert!(!is_owner(&admin, doc.owner));

        doc.grant(admin.id, Grant::view(), true);
        assert!(matches!(
            doc.eval(admin),
            Access::Administrator { wrapped_key: Some(_) }
        ));
    }

    #[test]
    fn test_has_capability() {
        let mut doc = Doc::new();
        let bob = viewer();
        doc.grant(bob.id, Grant::new(ObjectType::Comment, Permission::Post), false);

        let check = |s: &Subject, t, p| has_capability(s, doc.id, doc.owner, &doc.entries, t, p);

        assert!(check(&bob, ObjectType::Comment, Permission::Post));
        assert!(!check(&bob, ObjectType::AuditLog, Permission::View));
        assert!(check(
            &Subject::new(doc.owner, Role::Owner),
            ObjectType::AuditLog,
            Permission::View
        ));
    }

    #[test]
    fn test_admin_owning_an_idea_is_owner() {
        let doc = Doc::new();
        let admin = Subject::new(doc.owner, Role::Admin);

        assert!(is_owner(&admin, doc.owner));
        assert_eq!(doc.eval(admin), Access::Owner);
    }

    #[test]
    fn test_admin_holds_sub_resource_capabilities() {
        let doc = Doc::new();
        let admin = Subject::new(UserId::new(), Role::Admin);

        assert!(has_capability(
            &admin,
            doc.id,
            doc.owner,
            &doc.entries,
            ObjectType::Comment,
            Permission::Post
        ));
        assert!(!has_capability(
            &viewer(),
            doc.id,
            doc.owner,
            &doc.entries,
            ObjectType::Comment,
            Permission::Post
        ));
    }

    #[test]
    fn test_index_lookup_by_grant() {
        let mut doc = Doc::new();
        let bob = viewer();
        doc.grant(bob.id, Grant::view(), true);
        doc.grant(bob.id, Grant::verify(), false);
        doc.grant(UserId::new(), Grant::verify(), false);

        let index = AclIndex::new(doc.id, &doc.entries);
        assert!(index.get(bob.id, Grant::view()).is_some_and(|e| e.wrapped_key.is_some()));
        assert!(index.has(bob.id, Grant::verify()));
        assert!(!index.has(doc.owner, Grant::view()));
    }
}
