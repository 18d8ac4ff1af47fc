use std::collections::BTreeMap;
use std::str::FromStr;

use campus_core::config::CoreConfig;
use campus_core::db::DatabasePool;
use campus_core::errors::{CampusError, Result};
use campus_protocol::scheduling::{
    Allocation, AllocationPatch, AllocationQuery, AllocationStatus, AttributeDataType,
    AttributeValue, Booking, BookingQuery, BookingStatus, Classroom, Resource, ResourceStatus,
    TimeWindow,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

const BOOKING_COLUMNS: &str = "id, classroom_id, title, booking_type, recurrence, requested_by, \
     starts_at, ends_at, status, created_at, updated_at";

const ALLOCATION_COLUMNS: &str = "id, resource_id, allocated_to_user, allocated_to_department, \
     notes, allocated_at, due_back, status, created_at, updated_at";

/// Database-backed store for bookings, allocations and entity attributes.
#[derive(Clone)]
pub struct SchedulingRepository {
    pool: DatabasePool,
}

impl SchedulingRepository {
    /// Connects to the database using the supplied configuration and ensures
    /// migrations ran.
    pub async fn from_config(config: &CoreConfig) -> Result<Self> {
        let pool = DatabasePool::connect(config).await?;
        Self::from_pool(pool).await
    }

    /// Builds the repository from an existing database pool.
    pub async fn from_pool(pool: DatabasePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(pool.inner())
            .await
            .map_err(|err| CampusError::DatabaseError(err.to_string()))?;
        Ok(Self { pool })
    }

    /// Opens a transaction for a check-then-write flow.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.inner().begin().await?)
    }

    /// Serialises concurrent writers for the same classroom or resource.
    ///
    /// The lock is transaction-scoped and released on commit or rollback, so
    /// the overlap check and the subsequent insert cannot interleave with a
    /// competing writer for the same subject.
    pub async fn lock_subject(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        subject_id: Uuid,
    ) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(subject_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Fetches a classroom by its identifier.
    pub async fn classroom(&self, id: Uuid) -> Result<Option<Classroom>> {
        let row = sqlx::query_as::<_, ClassroomRow>(
            "SELECT id, name, building, capacity, is_active, created_at \
             FROM classrooms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await?;

        Ok(row.map(Into::into))
    }

    /// Fetches a resource by its identifier.
    pub async fn resource(&self, id: Uuid) -> Result<Option<Resource>> {
        let row = sqlx::query_as::<_, ResourceRow>(
            "SELECT id, resource_type_id, name, status, created_at, updated_at \
             FROM resources WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(Resource::try_from).transpose()
    }

    /// Updates the derived availability status of a resource.
    pub async fn set_resource_status(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        resource_id: Uuid,
        status: ResourceStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE resources SET status = $2, updated_at = now() WHERE id = $1")
            .bind(resource_id)
            .bind(status.as_str())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Recomputes the resource status after an allocation is returned:
    /// still `allocated` while another active allocation remains, otherwise
    /// back to `available`.
    pub async fn reconcile_resource_status(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        resource_id: Uuid,
        returned_allocation_id: Uuid,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE resources SET
                status = CASE WHEN EXISTS (
                    SELECT 1 FROM resource_allocations
                    WHERE resource_id = $1 AND id <> $2 AND status = 'allocated'
                ) THEN 'allocated' ELSE 'available' END,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(resource_id)
        .bind(returned_allocation_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Inserts a new booking and returns the stored representation.
    pub async fn insert_booking(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        booking: &Booking,
    ) -> Result<Booking> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "INSERT INTO classroom_bookings ( \
                 id, classroom_id, title, booking_type, recurrence, requested_by, \
                 starts_at, ends_at, status \
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.id)
        .bind(booking.classroom_id)
        .bind(&booking.title)
        .bind(&booking.booking_type)
        .bind(&booking.recurrence)
        .bind(booking.requested_by)
        .bind(booking.starts_at)
        .bind(booking.ends_at)
        .bind(booking.status.as_str())
        .fetch_one(&mut **tx)
        .await?;

        row.try_into()
    }

    /// Fetches a booking by its identifier.
    pub async fn booking(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM classroom_bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(Booking::try_from).transpose()
    }

    /// Re-reads a booking inside an open transaction, after the classroom
    /// lock was granted, so the caller sees any transition a competing
    /// writer committed first.
    pub async fn booking_for_update(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
    ) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM classroom_bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    /// Lists bookings based on the provided query filters.
    pub async fn list_bookings(&self, query: &BookingQuery) -> Result<Vec<Booking>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {BOOKING_COLUMNS} FROM classroom_bookings WHERE 1=1"
        ));

        if let Some(classroom_id) = query.classroom_id {
            builder.push(" AND classroom_id = ");
            builder.push_bind(classroom_id);
        }

        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }

        builder.push(" ORDER BY starts_at DESC");

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }

        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }

        let rows = builder
            .build_query_as::<BookingRow>()
            .fetch_all(self.pool.inner())
            .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    /// Moves a booking to a new status, returning the updated row.
    pub async fn update_booking_status(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE classroom_bookings SET status = $2, updated_at = now() \
             WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Booking::try_from).transpose()
    }

    /// Windows of all confirmed bookings for a classroom.
    pub async fn confirmed_booking_windows(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        classroom_id: Uuid,
    ) -> Result<Vec<(Uuid, TimeWindow)>> {
        let rows = sqlx::query_as::<_, WindowRow>(
            "SELECT id, starts_at, ends_at FROM classroom_bookings \
             WHERE classroom_id = $1 AND status = 'confirmed'",
        )
        .bind(classroom_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(WindowRow::into_window).collect())
    }

    /// Windows of all active allocations for a resource. An allocation
    /// without a due-back date holds the resource indefinitely.
    pub async fn allocated_windows(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        resource_id: Uuid,
    ) -> Result<Vec<(Uuid, TimeWindow)>> {
        let rows = sqlx::query_as::<_, WindowRow>(
            "SELECT id, allocated_at AS starts_at, due_back AS ends_at \
             FROM resource_allocations WHERE resource_id = $1 AND status = 'allocated'",
        )
        .bind(resource_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(WindowRow::into_window).collect())
    }

    /// Inserts a new allocation and returns the stored representation.
    pub async fn insert_allocation(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        allocation: &Allocation,
    ) -> Result<Allocation> {
        let row = sqlx::query_as::<_, AllocationRow>(&format!(
            "INSERT INTO resource_allocations ( \
                 id, resource_id, allocated_to_user, allocated_to_department, \
                 notes, allocated_at, due_back, status \
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {ALLOCATION_COLUMNS}"
        ))
        .bind(allocation.id)
        .bind(allocation.resource_id)
        .bind(allocation.allocated_to_user)
        .bind(&allocation.allocated_to_department)
        .bind(&allocation.notes)
        .bind(allocation.allocated_at)
        .bind(allocation.due_back)
        .bind(allocation.status.as_str())
        .fetch_one(&mut **tx)
        .await?;

        row.try_into()
    }

    /// Fetches an allocation by its identifier.
    pub async fn allocation(&self, id: Uuid) -> Result<Option<Allocation>> {
        let row = sqlx::query_as::<_, AllocationRow>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM resource_allocations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(Allocation::try_from).transpose()
    }

    /// Re-reads an allocation inside an open transaction, after the resource
    /// lock was granted, so the window feeding a conflict check reflects
    /// writes committed while this writer was waiting.
    pub async fn allocation_for_update(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
    ) -> Result<Option<Allocation>> {
        let row = sqlx::query_as::<_, AllocationRow>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM resource_allocations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        row.map(Allocation::try_from).transpose()
    }

    /// Lists allocations based on the provided query filters.
    pub async fn list_allocations(&self, query: &AllocationQuery) -> Result<Vec<Allocation>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {ALLOCATION_COLUMNS} FROM resource_allocations WHERE 1=1"
        ));

        if let Some(resource_id) = query.resource_id {
            builder.push(" AND resource_id = ");
            builder.push_bind(resource_id);
        }

        if let Some(status) = query.status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }

        if let Some(department) = &query.department {
            builder.push(" AND allocated_to_department = ");
            builder.push_bind(department.clone());
        }

        builder.push(" ORDER BY allocated_at DESC");

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }

        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }

        let rows = builder
            .build_query_as::<AllocationRow>()
            .fetch_all(self.pool.inner())
            .await?;

        rows.into_iter().map(Allocation::try_from).collect()
    }

    /// Applies a partial update to an allocation, returning the updated row.
    pub async fn update_allocation(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        patch: &AllocationPatch,
    ) -> Result<Option<Allocation>> {
        let mut builder =
            QueryBuilder::new("UPDATE resource_allocations SET updated_at = now()");

        if let Some(user) = patch.allocated_to_user {
            builder.push(", allocated_to_user = ");
            builder.push_bind(user);
        }

        if let Some(department) = &patch.allocated_to_department {
            builder.push(", allocated_to_department = ");
            builder.push_bind(department.clone());
        }

        if let Some(due_back) = patch.due_back {
            builder.push(", due_back = ");
            builder.push_bind(due_back);
        }

        if let Some(notes) = &patch.notes {
            builder.push(", notes = ");
            builder.push_bind(notes.clone());
        }

        if let Some(status) = patch.status {
            builder.push(", status = ");
            builder.push_bind(status.as_str());
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(format!(" RETURNING {ALLOCATION_COLUMNS}"));

        let row = builder
            .build_query_as::<AllocationRow>()
            .fetch_optional(&mut **tx)
            .await?;

        row.map(Allocation::try_from).transpose()
    }

    /// Looks up the declared data type for an attribute name.
    pub async fn attribute_definition(
        &self,
        entity_type: &str,
        attribute_name: &str,
    ) -> Result<Option<AttributeDataType>> {
        let raw: Option<(String,)> = sqlx::query_as(
            "SELECT data_type FROM attribute_definitions \
             WHERE entity_type = $1 AND attribute_name = $2",
        )
        .bind(entity_type)
        .bind(attribute_name)
        .fetch_optional(self.pool.inner())
        .await?;

        raw.map(|(data_type,)| parse_stored(&data_type)).transpose()
    }

    /// Materialises the flat attribute map for an entity.
    pub async fn attributes(
        &self,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<BTreeMap<String, AttributeValue>> {
        let rows = sqlx::query_as::<_, AttributeRow>(
            "SELECT attribute_name, data_type, value_string, value_integer, value_decimal, \
                    value_boolean, value_datetime, value_json \
             FROM entity_attributes WHERE entity_type = $1 AND entity_id = $2",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(self.pool.inner())
        .await?;

        let mut attributes = BTreeMap::new();
        for row in rows {
            let name = row.attribute_name.clone();
            attributes.insert(name, row.into_value()?);
        }
        Ok(attributes)
    }

    /// Writes one attribute value, overwriting any previous row for the
    /// same (entity type, entity id, name) key.
    pub async fn upsert_attribute(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        attribute_name: &str,
        value: &AttributeValue,
    ) -> Result<()> {
        let slots = AttributeSlots::from(value);
        sqlx::query(
            r#"
            INSERT INTO entity_attributes (
                id, entity_type, entity_id, attribute_name, data_type,
                value_string, value_integer, value_decimal, value_boolean,
                value_datetime, value_json
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (entity_type, entity_id, attribute_name) DO UPDATE SET
                data_type = EXCLUDED.data_type,
                value_string = EXCLUDED.value_string,
                value_integer = EXCLUDED.value_integer,
                value_decimal = EXCLUDED.value_decimal,
                value_boolean = EXCLUDED.value_boolean,
                value_datetime = EXCLUDED.value_datetime,
                value_json = EXCLUDED.value_json,
                updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entity_type)
        .bind(entity_id)
        .bind(attribute_name)
        .bind(value.data_type().as_str())
        .bind(slots.string)
        .bind(slots.integer)
        .bind(slots.decimal)
        .bind(slots.boolean)
        .bind(slots.datetime)
        .bind(slots.json)
        .execute(self.pool.inner())
        .await?;

        Ok(())
    }
}

fn parse_stored<T>(raw: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse().map_err(CampusError::DatabaseError)
}

#[derive(FromRow)]
struct ClassroomRow {
    id: Uuid,
    name: String,
    building: Option<String>,
    capacity: Option<i32>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<ClassroomRow> for Classroom {
    fn from(row: ClassroomRow) -> Self {
        Classroom {
            id: row.id,
            name: row.name,
            building: row.building,
            capacity: row.capacity,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ResourceRow {
    id: Uuid,
    resource_type_id: Option<Uuid>,
    name: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ResourceRow> for Resource {
    type Error = CampusError;

    fn try_from(row: ResourceRow) -> Result<Self> {
        Ok(Resource {
            id: row.id,
            resource_type_id: row.resource_type_id,
            name: row.name,
            status: parse_stored(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    classroom_id: Uuid,
    title: String,
    booking_type: Option<String>,
    recurrence: Option<String>,
    requested_by: Option<Uuid>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CampusError;

    fn try_from(row: BookingRow) -> Result<Self> {
        Ok(Booking {
            id: row.id,
            classroom_id: row.classroom_id,
            title: row.title,
            booking_type: row.booking_type,
            recurrence: row.recurrence,
            requested_by: row.requested_by,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            status: parse_stored(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AllocationRow {
    id: Uuid,
    resource_id: Uuid,
    allocated_to_user: Option<Uuid>,
    allocated_to_department: Option<String>,
    notes: Option<String>,
    allocated_at: DateTime<Utc>,
    due_back: Option<DateTime<Utc>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AllocationRow> for Allocation {
    type Error = CampusError;

    fn try_from(row: AllocationRow) -> Result<Self> {
        Ok(Allocation {
            id: row.id,
            resource_id: row.resource_id,
            allocated_to_user: row.allocated_to_user,
            allocated_to_department: row.allocated_to_department,
            notes: row.notes,
            allocated_at: row.allocated_at,
            due_back: row.due_back,
            status: parse_stored::<AllocationStatus>(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct WindowRow {
    id: Uuid,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
}

impl WindowRow {
    fn into_window(self) -> (Uuid, TimeWindow) {
        (
            self.id,
            TimeWindow {
                start: self.starts_at,
                end: self.ends_at,
            },
        )
    }
}

#[derive(FromRow)]
struct AttributeRow {
    attribute_name: String,
    data_type: String,
    value_string: Option<String>,
    value_integer: Option<i64>,
    value_decimal: Option<f64>,
    value_boolean: Option<bool>,
    value_datetime: Option<DateTime<Utc>>,
    value_json: Option<Value>,
}

impl AttributeRow {
    fn into_value(self) -> Result<AttributeValue> {
        let data_type: AttributeDataType = parse_stored(&self.data_type)?;
        let value = match data_type {
            AttributeDataType::String => self.value_string.map(AttributeValue::String),
            AttributeDataType::Integer => self.value_integer.map(AttributeValue::Integer),
            AttributeDataType::Decimal => self.value_decimal.map(AttributeValue::Decimal),
            AttributeDataType::Boolean => self.value_boolean.map(AttributeValue::Boolean),
            AttributeDataType::Datetime => self.value_datetime.map(AttributeValue::Datetime),
            AttributeDataType::Json => self.value_json.map(AttributeValue::Json),
        };

        value.ok_or_else(|| {
            CampusError::DatabaseError(format!(
                "attribute {} has no value in its declared {} slot",
                self.attribute_name, self.data_type
            ))
        })
    }
}

/// One populated slot per stored attribute row.
struct AttributeSlots {
    string: Option<String>,
    integer: Option<i64>,
    decimal: Option<f64>,
    boolean: Option<bool>,
    datetime: Option<DateTime<Utc>>,
    json: Option<Value>,
}

impl From<&AttributeValue> for AttributeSlots {
    fn from(value: &AttributeValue) -> Self {
        let mut slots = AttributeSlots {
            string: None,
            integer: None,
            decimal: None,
            boolean: None,
            datetime: None,
            json: None,
        };

        match value {
            AttributeValue::String(text) => slots.string = Some(text.clone()),
            AttributeValue::Integer(number) => slots.integer = Some(*number),
            AttributeValue::Decimal(number) => slots.decimal = Some(*number),
            AttributeValue::Boolean(flag) => slots.boolean = Some(*flag),
            AttributeValue::Datetime(instant) => slots.datetime = Some(*instant),
            AttributeValue::Json(value) => slots.json = Some(value.clone()),
        }

        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_row_reads_the_declared_slot() {
        let row = AttributeRow {
            attribute_name: "is_software".into(),
            data_type: "boolean".into(),
            value_string: None,
            value_integer: None,
            value_decimal: None,
            value_boolean: Some(true),
            value_datetime: None,
            value_json: None,
        };
        assert_eq!(row.into_value().unwrap(), AttributeValue::Boolean(true));
    }

    #[test]
    fn attribute_row_with_empty_slot_is_an_error() {
        let row = AttributeRow {
            attribute_name: "warranty_months".into(),
            data_type: "integer".into(),
            value_string: Some("12".into()),
            value_integer: None,
            value_decimal: None,
            value_boolean: None,
            value_datetime: None,
            value_json: None,
        };
        assert!(matches!(
            row.into_value(),
            Err(CampusError::DatabaseError(_))
        ));
    }

    #[test]
    fn slots_populate_exactly_one_column() {
        let slots = AttributeSlots::from(&AttributeValue::Integer(42));
        assert_eq!(slots.integer, Some(42));
        assert!(slots.string.is_none());
        assert!(slots.boolean.is_none());
        assert!(slots.json.is_none());
    }
}
