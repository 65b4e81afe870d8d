//! Grant planning for new idea versions.
//!
//! Planning is pure: it decides *who* gets *which* capability on a new
//! version. Key material is only touched in [`materialize`], which wraps the
//! new document key for every keyed entry.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use ideavault_core::{IdeaId, UserId};

use crate::acl::{AclEntry, Grant, OWNER_GRANTS};
use crate::crypto::{EncryptionKey, X25519PublicKey};
use crate::error::{PermsError, Result};
use crate::wrap::WrappedKey;

/// How a new version derives its ACL from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AclMode {
    /// Carry over every parent entry not held by the uploader.
    Inherit,
    /// Only the collaborators listed with this upload.
    #[default]
    Fresh,
}

/// Grants for a collaborator already resolved to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientGrants {
    pub recipient: UserId,
    pub grants: Vec<Grant>,
}

/// One entry to be created on the new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrantPlan {
    pub subject: UserId,
    pub grant: Grant,
}

impl GrantPlan {
    pub fn needs_key(&self) -> bool {
        self.grant.requires_key()
    }
}

/// Compute the entries a new version gets.
///
/// The uploader's owner self-entries come first, followed by inherited
/// entries (in `Inherit` mode) and then explicit requests. Duplicates are
/// dropped, keeping the first occurrence.
pub fn plan_grants(
    parent_entries: &[AclEntry],
    requests: &[RecipientGrants],
    mode: AclMode,
    uploader: UserId,
) -> Vec<GrantPlan> {
    let owner = OWNER_GRANTS.iter().map(|&grant| GrantPlan {
        subject: uploader,
        grant,
    });

    let inherited = parent_entries
        .iter()
        .filter(|_| mode == AclMode::Inherit)
        .filter(|e| e.subject != uploader)
        .map(|e| GrantPlan {
            subject: e.subject,
            grant: e.grant(),
        });

    let requested = requests.iter().flat_map(|r| {
        r.grants.iter().map(move |&grant| GrantPlan {
            subject: r.recipient,
            grant,
        })
    });

    let mut seen = BTreeSet::new();
    owner
        .chain(inherited)
        .chain(requested)
        .filter(|plan| seen.insert(*plan))
        .collect()
}

/// Turn plans into ACL entries for `object`, wrapping `key` for keyed grants.
///
/// `recipients` must hold the current exchange key of every subject with a
/// keyed plan.
pub fn materialize(
    plans: &[GrantPlan],
    object: IdeaId,
    key: &EncryptionKey,
    recipients: &HashMap<UserId, X25519PublicKey>,
) -> Result<Vec<AclEntry>> {
    plans
        .iter()
        .map(|plan| {
            let wrapped_key = if plan.needs_key() {
                let public = recipients.get(&plan.subject).ok_or_else(|| {
                    PermsError::InvalidGrant(format!("no public key for recipient {}", plan.subject))
                })?;
                Some(WrappedKey::wrap(key, public, object.as_bytes())?)
            } else {
                None
            };
            Ok(AclEntry::new(plan.subject, object, plan.grant, wrapped_key))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::X25519StaticSecret;
    use ideavault_core::{ObjectType, Permission};

    fn entry(subject: UserId, object: IdeaId, grant: Grant) -> AclEntry {
        AclEntry::new(subject, object, grant, None)
    }

    #[test]
    fn test_fresh_mode_ignores_parent() {
        let owner = UserId::new();
        let bob = UserId::new();
        let parent = vec![entry(bob, IdeaId::new(), Grant::view())];

        let plans = plan_grants(&parent, &[], AclMode::Fresh, owner);

        assert_eq!(plans.len(), OWNER_GRANTS.len());
        assert!(plans.iter().all(|p| p.subject == owner));
    }

    #[test]
    fn test_inherit_mode_copies_others_but_not_uploader() {
        let owner = UserId::new();
        let bob = UserId::new();
        let carol = UserId::new();
        let parent_id = IdeaId::new();
        let parent = vec![
            entry(owner, parent_id, Grant::view()),
            entry(owner, parent_id, Grant::new(ObjectType::Comment, Permission::Share)),
            entry(bob, parent_id, Grant::view()),
            entry(carol, parent_id, Grant::verify()),
        ];

        let plans = plan_grants(&parent, &[], AclMode::Inherit, owner);

        assert_eq!(plans.len(), OWNER_GRANTS.len() + 2);
        assert!(plans.contains(&GrantPlan { subject: bob, grant: Grant::view() }));
        assert!(plans.contains(&GrantPlan { subject: carol, grant: Grant::verify() }));
        assert!(!plans.iter().any(|p| p.subject == owner
            && p.grant == Grant::new(ObjectType::Comment, Permission::Share)));
    }

    #[test]
    fn test_requests_apply_in_both_modes_and_dedup() {
        let owner = UserId::new();
        let bob = UserId::new();
        let parent = vec![entry(bob, IdeaId::new(), Grant::view())];
        let requests = vec![RecipientGrants {
            recipient: bob,
            grants: vec![Grant::view(), Grant::verify()],
        }];

        let inherit = plan_grants(&parent, &requests, AclMode::Inherit, owner);
        let bob_plans: Vec<_> = inherit.iter().filter(|p| p.subject == bob).collect();
        assert_eq!(bob_plans.len(), 2);

        let fresh = plan_grants(&parent, &requests, AclMode::Fresh, owner);
        assert_eq!(fresh.iter().filter(|p| p.subject == bob).count(), 2);
    }

    #[test]
    fn test_owner_entries_come_first() {
        let owner = UserId::new();
        let requests = vec![RecipientGrants {
            recipient: UserId::new(),
            grants: vec![Grant::verify()],
        }];
        let plans = plan_grants(&[], &requests, AclMode::Fresh, owner);

        assert_eq!(plans[0], GrantPlan { subject: owner, grant: OWNER_GRANTS[0] });
        assert_ne!(plans.last().map(|p| p.subject), Some(owner));
    }

    #[test]
    fn test_materialize_wraps_only_view() {
        let owner_secret = X25519StaticSecret::generate();
        let owner = UserId::new();
        let object = IdeaId::new();
        let key = EncryptionKey::generate();

        let plans = plan_grants(&[], &[], AclMode::Fresh, owner);
        let recipients = HashMap::from([(owner, owner_secret.public_key())]);
        let entries = materialize(&plans, object, &key, &recipients).unwrap();

        for e in &entries {
            e.validate().unwrap();
            assert_eq!(e.wrapped_key.is_some(), e.grant() == Grant::view());
        }
        let view = entries.iter().find(|e| e.grant() == Grant::view()).unwrap();
        let opened = view
            .wrapped_key
            .as_ref()
            .unwrap()
            .unwrap(&owner_secret, object.as_bytes())
            .unwrap();
        assert_eq!(opened.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_materialize_requires_recipient_key() {
        let plans = plan_grants(&[], &[], AclMode::Fresh, UserId::new());
        let err = materialize(&plans, IdeaId::new(), &EncryptionKey::generate(), &HashMap::new());
        assert!(matches!(err, Err(PermsError::InvalidGrant(_))));
    }
}
