//! Proptest generators for property-based testing.

use proptest::prelude::*;

use ideavault_core::{ObjectType, Permission};
use ideavault_perms::Grant;

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate an ObjectType.
pub fn object_type() -> impl Strategy<Value = ObjectType> {
    prop_oneof![
        Just(ObjectType::Idea),
        Just(ObjectType::Comment),
        Just(ObjectType::AuditLog),
    ]
}

/// Generate a Permission.
pub fn permission() -> impl Strategy<Value = Permission> {
    prop_oneof![
        Just(Permission::View),
        Just(Permission::Verify),
        Just(Permission::Post),
        Just(Permission::Share),
        Just(Permission::Revoke),
    ]
}

pub fn grant() -> impl Strategy<Value = Grant> {
    (object_type(), permission()).prop_map(|(t, p)| Grant::new(t, p))
}

/// A non-empty set of distinct grants, in sorted order.
pub fn grants() -> impl Strategy<Value = Vec<Grant>> {
    prop::collection::btree_set(grant(), 1..=6).prop_map(|set| set.into_iter().collect())
}

/// Generate a password meeting the default policy.
pub fn password() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{9,16}[0-9]{1,3}[!#%&*+=?@^_-]".prop_map(String::from)
}

/// Generate a document title.
pub fn title() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,40}".prop_map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideavault::PasswordPolicy;

    proptest! {
        #[test]
        fn generated_passwords_meet_policy(password in password()) {
            prop_assert!(PasswordPolicy::default().check(&password).is_ok());
        }

        #[test]
        fn generated_grants_are_distinct(grants in grants()) {
            let mut sorted = grants.clone();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), grants.len());
            prop_assert!(!grants.is_empty());
        }
    }
}
