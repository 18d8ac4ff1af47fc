use std::collections::BTreeMap;

use campus_core::errors::{CampusError, Result};
use campus_protocol::scheduling::{
    Allocation, AllocationPatch, AllocationQuery, AllocationStatus, AttributeValue, Booking,
    BookingQuery, BookingStatus, CreateAllocationRequest, CreateBookingRequest, ResourceDetail,
    ResourceStatus, SetAttributeRequest, TimeWindow, UpdateBookingStatusRequest,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::allocation::{self, RESOURCE_ENTITY};
use crate::booking;
use crate::overlap;
use crate::repository::SchedulingRepository;

/// Application core gluing the overlap detector, the state machines and the
/// attribute store to the repository.
#[derive(Clone)]
pub struct SchedulingService {
    repo: SchedulingRepository,
}

impl SchedulingService {
    pub fn new(repo: SchedulingRepository) -> Self {
        Self { repo }
    }

    /// Creates a classroom booking in `pending` status.
    ///
    /// The conflict scan runs against confirmed bookings only, inside a
    /// transaction holding the classroom's advisory lock, so two concurrent
    /// requests for the same window cannot both pass the check.
    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<Booking> {
        let window = TimeWindow::bounded(request.starts_at, request.ends_at);
        if !window.is_valid() {
            return Err(CampusError::InvalidInput(
                "booking must end after it starts".into(),
            ));
        }

        let classroom = self
            .repo
            .classroom(request.classroom_id)
            .await?
            .ok_or_else(|| {
                CampusError::NotFound(format!("classroom {}", request.classroom_id))
            })?;
        if !classroom.is_active {
            return Err(CampusError::InvalidInput(format!(
                "classroom {} is inactive",
                classroom.id
            )));
        }

        let mut tx = self.repo.begin().await?;
        self.repo.lock_subject(&mut tx, classroom.id).await?;

        let held = self
            .repo
            .confirmed_booking_windows(&mut tx, classroom.id)
            .await?;
        if overlap::has_conflict(&held, &window, None) {
            return Err(CampusError::Conflict(format!(
                "classroom {} already has a confirmed booking in this window",
                classroom.id
            )));
        }

        let now = Utc::now();
        let candidate = Booking {
            id: Uuid::new_v4(),
            classroom_id: classroom.id,
            title: request.title,
            booking_type: request.booking_type,
            recurrence: request.recurrence,
            requested_by: request.requested_by,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repo.insert_booking(&mut tx, &candidate).await?;
        tx.commit().await?;

        info!(booking_id = %stored.id, classroom_id = %stored.classroom_id, "booking created");
        Ok(stored)
    }

    /// Fetches a booking by its identifier.
    pub async fn get_booking(&self, id: Uuid) -> Result<Booking> {
        self.repo
            .booking(id)
            .await?
            .ok_or_else(|| CampusError::NotFound(format!("booking {id}")))
    }

    /// Lists bookings matching the query filters.
    pub async fn list_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>> {
        self.repo.list_bookings(query).await
    }

    /// Drives a booking through its lifecycle.
    ///
    /// Confirmation re-runs the overlap scan against the bookings that are
    /// confirmed right now, excluding the booking itself, closing the gap
    /// where an overlapping pending booking was confirmed first.
    pub async fn update_booking_status(
        &self,
        id: Uuid,
        request: UpdateBookingStatusRequest,
    ) -> Result<Booking> {
        let current = self.get_booking(id).await?;

        let mut tx = self.repo.begin().await?;
        self.repo.lock_subject(&mut tx, current.classroom_id).await?;

        // classroom_id never changes, so the pre-lock read picked the right
        // lock subject; the status must be re-read under the lock so a
        // transition that committed first is not overwritten.
        let current = self
            .repo
            .booking_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| CampusError::NotFound(format!("booking {id}")))?;

        booking::authorize_status_change(
            &current,
            request.status,
            request.actor_role,
            request.actor_id,
        )?;
        booking::ensure_transition(current.status, request.status)?;

        if request.status == BookingStatus::Confirmed {
            let held = self
                .repo
                .confirmed_booking_windows(&mut tx, current.classroom_id)
                .await?;
            if overlap::has_conflict(&held, &current.window(), Some(id)) {
                return Err(CampusError::Conflict(format!(
                    "classroom {} was confirmed for an overlapping window",
                    current.classroom_id
                )));
            }
        }

        let updated = self
            .repo
            .update_booking_status(&mut tx, id, request.status)
            .await?
            .ok_or_else(|| CampusError::NotFound(format!("booking {id}")))?;
        tx.commit().await?;

        info!(booking_id = %id, status = updated.status.as_str(), "booking status updated");
        Ok(updated)
    }

    /// Creates a resource allocation.
    ///
    /// Hardware resources get an overlap scan over active allocations; a
    /// software-flagged resource bypasses exclusivity entirely. If the
    /// stored status is `allocated`, the resource status flips to
    /// `allocated` in the same transaction.
    pub async fn create_allocation(&self, request: CreateAllocationRequest) -> Result<Allocation> {
        let resource_id = request
            .resource_id
            .ok_or_else(|| CampusError::InvalidInput("resource_id is required".into()))?;

        let allocated_at = request.allocated_at.unwrap_or_else(Utc::now);
        let window = TimeWindow {
            start: allocated_at,
            end: request.due_back,
        };
        if !window.is_valid() {
            return Err(CampusError::InvalidInput(
                "due_back must be after allocated_at".into(),
            ));
        }

        let resource = self
            .repo
            .resource(resource_id)
            .await?
            .ok_or_else(|| CampusError::NotFound(format!("resource {resource_id}")))?;

        let attributes = self.repo.attributes(RESOURCE_ENTITY, resource_id).await?;
        let software = allocation::is_software(&attributes);
        let status = allocation::effective_create_status(request.status, request.actor_role);

        let mut tx = self.repo.begin().await?;
        self.repo.lock_subject(&mut tx, resource_id).await?;

        if !software {
            let held = self.repo.allocated_windows(&mut tx, resource_id).await?;
            if overlap::has_conflict(&held, &window, None) {
                return Err(CampusError::Conflict(format!(
                    "resource {resource_id} is already allocated in this window"
                )));
            }
        }

        let now = Utc::now();
        let candidate = Allocation {
            id: Uuid::new_v4(),
            resource_id,
            allocated_to_user: request.allocated_to_user,
            allocated_to_department: request.allocated_to_department,
            notes: request.notes,
            allocated_at,
            due_back: request.due_back,
            status,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repo.insert_allocation(&mut tx, &candidate).await?;
        if stored.status == AllocationStatus::Allocated {
            self.repo
                .set_resource_status(&mut tx, resource_id, ResourceStatus::Allocated)
                .await?;
        }
        tx.commit().await?;

        info!(
            allocation_id = %stored.id,
            resource_id = %resource_id,
            status = stored.status.as_str(),
            "allocation created"
        );
        Ok(stored)
    }

    /// Fetches an allocation by its identifier.
    pub async fn get_allocation(&self, id: Uuid) -> Result<Allocation> {
        self.repo
            .allocation(id)
            .await?
            .ok_or_else(|| CampusError::NotFound(format!("allocation {id}")))
    }

    /// Lists allocations matching the query filters.
    pub async fn list_allocations(&self, query: &AllocationQuery) -> Result<Vec<Allocation>> {
        self.repo.list_allocations(query).await
    }

    /// Applies a partial update to an allocation.
    ///
    /// Returning an allocation recomputes the resource status from the
    /// remaining active allocations; re-allocating re-runs the hardware
    /// overlap scan excluding the allocation's own id.
    pub async fn update_allocation(&self, id: Uuid, patch: AllocationPatch) -> Result<Allocation> {
        let existing = self.get_allocation(id).await?;

        let mut tx = self.repo.begin().await?;
        self.repo.lock_subject(&mut tx, existing.resource_id).await?;

        // resource_id never changes, so the pre-lock read picked the right
        // lock subject; the window and status feeding the conflict check
        // must come from a re-read under the lock.
        let existing = self
            .repo
            .allocation_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| CampusError::NotFound(format!("allocation {id}")))?;

        let effective_window = TimeWindow {
            start: existing.allocated_at,
            end: patch.due_back.or(existing.due_back),
        };
        if !effective_window.is_valid() {
            return Err(CampusError::InvalidInput(
                "due_back must be after allocated_at".into(),
            ));
        }

        if patch.status == Some(AllocationStatus::Allocated) {
            let attributes = self
                .repo
                .attributes(RESOURCE_ENTITY, existing.resource_id)
                .await?;
            if !allocation::is_software(&attributes) {
                let held = self
                    .repo
                    .allocated_windows(&mut tx, existing.resource_id)
                    .await?;
                if overlap::has_conflict(&held, &effective_window, Some(id)) {
                    return Err(CampusError::Conflict(format!(
                        "resource {} is already allocated in this window",
                        existing.resource_id
                    )));
                }
            }
        }

        let updated = self
            .repo
            .update_allocation(&mut tx, id, &patch)
            .await?
            .ok_or_else(|| CampusError::NotFound(format!("allocation {id}")))?;

        match patch.status {
            Some(AllocationStatus::Allocated) => {
                self.repo
                    .set_resource_status(&mut tx, existing.resource_id, ResourceStatus::Allocated)
                    .await?;
            }
            Some(AllocationStatus::Returned) => {
                self.repo
                    .reconcile_resource_status(&mut tx, existing.resource_id, id)
                    .await?;
            }
            _ => {}
        }
        tx.commit().await?;

        info!(allocation_id = %id, status = updated.status.as_str(), "allocation updated");
        Ok(updated)
    }

    /// Fetches a resource together with its flexible attribute map.
    pub async fn get_resource(&self, id: Uuid) -> Result<ResourceDetail> {
        let resource = self
            .repo
            .resource(id)
            .await?
            .ok_or_else(|| CampusError::NotFound(format!("resource {id}")))?;
        let attributes = self.repo.attributes(RESOURCE_ENTITY, id).await?;
        Ok(ResourceDetail {
            resource,
            attributes,
        })
    }

    /// Materialises the flat attribute map for an entity.
    pub async fn get_attributes(
        &self,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<BTreeMap<String, AttributeValue>> {
        self.repo.attributes(entity_type, entity_id).await
    }

    /// Writes one typed attribute value.
    ///
    /// An attribute name without a registered definition is rejected with a
    /// typed failure; the write is idempotent on the key triple.
    pub async fn set_attribute(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        attribute_name: &str,
        request: SetAttributeRequest,
    ) -> Result<()> {
        let declared = self
            .repo
            .attribute_definition(entity_type, attribute_name)
            .await?
            .ok_or_else(|| {
                CampusError::UnknownAttribute(format!("{entity_type}.{attribute_name}"))
            })?;

        if declared != request.data_type {
            return Err(CampusError::InvalidInput(format!(
                "attribute {attribute_name} is declared as {}",
                declared.as_str()
            )));
        }

        let value = AttributeValue::from_declared(request.data_type, request.value)
            .map_err(CampusError::InvalidInput)?;

        self.repo
            .upsert_attribute(entity_type, entity_id, attribute_name, &value)
            .await?;

        info!(entity_type, entity_id = %entity_id, attribute_name, "attribute upserted");
        Ok(())
    }
}
