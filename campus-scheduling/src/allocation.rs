use std::collections::BTreeMap;

use campus_protocol::scheduling::{ActorRole, AllocationStatus, AttributeValue};

/// Attribute that marks a resource as non-exclusive: software licences can
/// be handed out to any number of holders at once.
pub const IS_SOFTWARE_ATTRIBUTE: &str = "is_software";

/// Entity type under which resource attributes are stored.
pub const RESOURCE_ENTITY: &str = "resource";

/// Status actually stored for a new allocation.
///
/// Self-service requests never bypass approval: a student actor always
/// lands in `pending`, whatever status was asked for.
pub fn effective_create_status(
    requested: Option<AllocationStatus>,
    actor_role: ActorRole,
) -> AllocationStatus {
    if actor_role == ActorRole::Student {
        return AllocationStatus::Pending;
    }
    requested.unwrap_or(AllocationStatus::Allocated)
}

/// Reads the exclusivity flag out of a resource's attribute map, coercing
/// the stored value where older writers stringified it.
pub fn is_software(attributes: &BTreeMap<String, AttributeValue>) -> bool {
    attributes
        .get(IS_SOFTWARE_ATTRIBUTE)
        .and_then(AttributeValue::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn students_are_forced_to_pending() {
        assert_eq!(
            effective_create_status(Some(AllocationStatus::Allocated), ActorRole::Student),
            AllocationStatus::Pending
        );
        assert_eq!(
            effective_create_status(None, ActorRole::Student),
            AllocationStatus::Pending
        );
    }

    #[test]
    fn staff_default_to_allocated() {
        assert_eq!(
            effective_create_status(None, ActorRole::Staff),
            AllocationStatus::Allocated
        );
        assert_eq!(
            effective_create_status(Some(AllocationStatus::Pending), ActorRole::Admin),
            AllocationStatus::Pending
        );
    }

    #[test]
    fn software_flag_defaults_to_hardware() {
        let mut attributes = BTreeMap::new();
        assert!(!is_software(&attributes));

        attributes.insert(
            IS_SOFTWARE_ATTRIBUTE.to_string(),
            AttributeValue::Boolean(true),
        );
        assert!(is_software(&attributes));
    }

    #[test]
    fn software_flag_coerces_legacy_strings() {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            IS_SOFTWARE_ATTRIBUTE.to_string(),
            AttributeValue::String("true".into()),
        );
        assert!(is_software(&attributes));

        attributes.insert(
            IS_SOFTWARE_ATTRIBUTE.to_string(),
            AttributeValue::String("0".into()),
        );
        assert!(!is_software(&attributes));
    }
}
