pub mod scheduling;

pub mod prelude {
    pub use crate::scheduling::{
        ActorRole, Allocation, AllocationPatch, AllocationQuery, AllocationStatus,
        AttributeDataType, AttributeValue, Booking, BookingQuery, BookingStatus, Classroom,
        Resource, ResourceStatus, TimeWindow,
    };
}
