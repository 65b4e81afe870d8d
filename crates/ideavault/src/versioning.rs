//! Version chains.
//!
//! A new version joins its parent's chain: it shares the parent's root and
//! takes the next free version number. Its ACL is planned from the parent's
//! entries and the upload's collaborators, then materialized under the new
//! document key.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ideavault_core::{IdeaId, Subject, UserId};
use ideavault_perms::{
    is_owner, materialize, plan_grants, AclEntry, AclMode, CollaboratorRequest, EncryptionKey, GrantPlan,
    RecipientGrants, X25519PublicKey,
};
use ideavault_store::{AclFilter, Store};

use crate::custodian::normalize_email;
use crate::error::{Result, VaultError};

/// Where an upload lands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionOptions {
    /// Version this upload supersedes. `None` starts a new chain.
    pub parent: Option<IdeaId>,
    /// How the parent's ACL carries over. Ignored without a parent.
    pub mode: AclMode,
}

impl VersionOptions {
    /// Start a new chain.
    pub fn new_chain() -> Self {
        Self::default()
    }

    pub fn next_of(parent: IdeaId, mode: AclMode) -> Self {
        Self {
            parent: Some(parent),
            mode,
        }
    }
}

/// A resolved position in a chain, before the version number is allocated.
#[derive(Debug, Clone)]
pub(crate) enum ChainPosition {
    New,
    Next {
        root: IdeaId,
        mode: AclMode,
        parent_entries: Vec<AclEntry>,
    },
}

impl ChainPosition {
    fn parent_entries(&self) -> &[AclEntry] {
        match self {
            ChainPosition::New => &[],
            ChainPosition::Next { parent_entries, .. } => parent_entries,
        }
    }

    fn mode(&self) -> AclMode {
        match self {
            ChainPosition::New => AclMode::Fresh,
            ChainPosition::Next { mode, .. } => *mode,
        }
    }
}

/// Resolve the parent of an upload by `uploader`.
///
/// Only the parent's owner may extend its chain.
pub(crate) async fn locate<S: Store>(
    store: &S,
    uploader: &Subject,
    options: &VersionOptions,
) -> Result<ChainPosition> {
    let Some(parent_id) = options.parent else {
        return Ok(ChainPosition::New);
    };

    let parent = store
        .get_idea(&parent_id)
        .await?
        .ok_or_else(|| VaultError::NotFound(format!("parent idea {}", parent_id)))?;

    if !is_owner(uploader, parent.owner) {
        return Err(VaultError::Forbidden(format!(
            "only the owner of {} may add versions",
            parent_id
        )));
    }

    let parent_entries = match options.mode {
        AclMode::Inherit => store.find_acl(&AclFilter::object(parent.id)).await?,
        AclMode::Fresh => Vec::new(),
    };

    Ok(ChainPosition::Next {
        root: parent.root,
        mode: options.mode,
        parent_entries,
    })
}

/// Root and version number for a new idea `id` at `position`.
///
/// Re-run on every attempt: a concurrent upload may have taken the number.
pub(crate) async fn allocate<S: Store>(
    store: &S,
    position: &ChainPosition,
    id: IdeaId,
) -> Result<(IdeaId, u32)> {
    match position {
        ChainPosition::New => Ok((id, 1)),
        ChainPosition::Next { root, .. } => {
            let latest = store.max_version(root).await?.unwrap_or(1);
            let version = latest.checked_add(1).ok_or_else(|| {
                VaultError::Conflict(format!("version chain {} is exhausted", root))
            })?;
            Ok((*root, version))
        }
    }
}

/// Resolve collaborator emails to users.
///
/// Every collaborator must already be registered; nothing is written
/// otherwise.
pub(crate) async fn resolve_collaborators<S: Store>(
    store: &S,
    requests: &[CollaboratorRequest],
) -> Result<(Vec<RecipientGrants>, HashMap<UserId, X25519PublicKey>)> {
    let mut grants = Vec::with_capacity(requests.len());
    let mut keys = HashMap::new();

    for request in requests {
        request.validate()?;
        let email = normalize_email(&request.email)?;
        let user = store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("collaborator {}", email)))?;

        keys.insert(user.id, user.public_key.exchange);
        grants.push(RecipientGrants {
            recipient: user.id,
            grants: request.grants.clone(),
        });
    }

    Ok((grants, keys))
}

/// Plan and materialize the ACL of a new version.
///
/// `recipients` holds exchange keys already known (uploader, collaborators).
/// Inherited holders are looked up for their *current* key; a holder whose
/// account no longer exists is dropped.
pub(crate) async fn build_entries<S: Store>(
    store: &S,
    position: &ChainPosition,
    requests: &[RecipientGrants],
    uploader: UserId,
    object: IdeaId,
    key: &EncryptionKey,
    mut recipients: HashMap<UserId, X25519PublicKey>,
) -> Result<Vec<AclEntry>> {
    let mut plans = plan_grants(position.parent_entries(), requests, position.mode(), uploader);

    let mut missing = Vec::new();
    for plan in plans.iter().filter(|p| p.needs_key()) {
        if recipients.contains_key(&plan.subject) || missing.contains(&plan.subject) {
            continue;
        }
        match store.get_user(&plan.subject).await? {
            Some(user) => {
                recipients.insert(user.id, user.public_key.exchange);
            }
            None => missing.push(plan.subject),
        }
    }

    if !missing.is_empty() {
        warn!(idea = %object, dropped = missing.len(), "inherited grants held by unknown users");
        plans.retain(|p: &GrantPlan| !missing.contains(&p.subject));
    }

    debug!(idea = %object, entries = plans.len(), mode = ?position.mode(), "materializing grants");
    Ok(materialize(&plans, object, key, &recipients)?)
}
