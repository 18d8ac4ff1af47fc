use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scheduling::attribute::AttributeValue;
use crate::scheduling::booking::ActorRole;
use crate::scheduling::window::TimeWindow;

/// Lifecycle status for a resource allocation.
///
/// There is no terminal enforcement here: a returned resource can be
/// allocated again through a fresh allocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Pending,
    Allocated,
    Returned,
}

impl Default for AllocationStatus {
    fn default() -> Self {
        AllocationStatus::Pending
    }
}

impl AllocationStatus {
    /// Whether an allocation in this status occupies the resource for
    /// conflict purposes.
    pub fn is_active(self) -> bool {
        matches!(self, AllocationStatus::Allocated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AllocationStatus::Pending => "pending",
            AllocationStatus::Allocated => "allocated",
            AllocationStatus::Returned => "returned",
        }
    }
}

impl FromStr for AllocationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(AllocationStatus::Pending),
            "allocated" => Ok(AllocationStatus::Allocated),
            "returned" => Ok(AllocationStatus::Returned),
            other => Err(format!("unknown allocation status: {other}")),
        }
    }
}

/// Availability of the resource itself, mirrored from its allocations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Available,
    Allocated,
    Maintenance,
    Retired,
}

impl ResourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceStatus::Available => "available",
            ResourceStatus::Allocated => "allocated",
            ResourceStatus::Maintenance => "maintenance",
            ResourceStatus::Retired => "retired",
        }
    }
}

impl FromStr for ResourceStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "available" => Ok(ResourceStatus::Available),
            "allocated" => Ok(ResourceStatus::Allocated),
            "maintenance" => Ok(ResourceStatus::Maintenance),
            "retired" => Ok(ResourceStatus::Retired),
            other => Err(format!("unknown resource status: {other}")),
        }
    }
}

/// An allocatable resource (hardware or software).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type_id: Option<Uuid>,
    pub name: String,
    pub status: ResourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A resource together with its flexible attribute map.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDetail {
    #[serde(flatten)]
    pub resource: Resource,
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// Assignment of a resource to a user or department over a time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub resource_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_to_user: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_to_department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub allocated_at: DateTime<Utc>,
    /// Absent means the allocation is open-ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_back: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: AllocationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    /// The time window this allocation occupies, open-ended without a
    /// due-back date.
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.allocated_at,
            end: self.due_back,
        }
    }
}

/// Payload for creating an allocation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAllocationRequest {
    /// Required; kept optional here so a missing value surfaces as an
    /// invalid-input failure instead of a deserialization rejection.
    #[serde(default)]
    pub resource_id: Option<Uuid>,
    #[serde(default)]
    pub allocated_to_user: Option<Uuid>,
    #[serde(default)]
    pub allocated_to_department: Option<String>,
    #[serde(default)]
    pub allocated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_back: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<AllocationStatus>,
    pub actor_role: ActorRole,
}

/// Partial update for an allocation. Absent fields are left unchanged;
/// a due-back date cannot be cleared once set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllocationPatch {
    #[serde(default)]
    pub allocated_to_user: Option<Uuid>,
    #[serde(default)]
    pub allocated_to_department: Option<String>,
    #[serde(default)]
    pub due_back: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<AllocationStatus>,
}

/// Client-facing query filters for allocation listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationQuery {
    pub resource_id: Option<Uuid>,
    pub status: Option<AllocationStatus>,
    pub department: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn open_ended_allocation_has_unbounded_window() {
        let start = Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap();
        let allocation = Allocation {
            id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            allocated_to_user: None,
            allocated_to_department: Some("physics".into()),
            notes: None,
            allocated_at: start,
            due_back: None,
            status: AllocationStatus::Allocated,
            created_at: start,
            updated_at: start,
        };
        let window = allocation.window();
        assert_eq!(window.start, start);
        assert!(window.end.is_none());
    }

    #[test]
    fn only_allocated_occupies_the_resource() {
        assert!(AllocationStatus::Allocated.is_active());
        assert!(!AllocationStatus::Pending.is_active());
        assert!(!AllocationStatus::Returned.is_active());
    }

    #[test]
    fn statuses_round_trip_through_strings() {
        for status in [
            AllocationStatus::Pending,
            AllocationStatus::Allocated,
            AllocationStatus::Returned,
        ] {
            assert_eq!(status.as_str().parse::<AllocationStatus>(), Ok(status));
        }
        for status in [
            ResourceStatus::Available,
            ResourceStatus::Allocated,
            ResourceStatus::Maintenance,
            ResourceStatus::Retired,
        ] {
            assert_eq!(status.as_str().parse::<ResourceStatus>(), Ok(status));
        }
    }
}
