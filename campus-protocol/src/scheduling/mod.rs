mod allocation;
mod attribute;
mod booking;
mod window;

pub use allocation::{
    Allocation, AllocationPatch, AllocationQuery, AllocationStatus, CreateAllocationRequest,
    Resource, ResourceDetail, ResourceStatus,
};
pub use attribute::{AttributeDataType, AttributeValue, SetAttributeRequest};
pub use booking::{
    ActorRole, Booking, BookingQuery, BookingStatus, Classroom, CreateBookingRequest,
    UpdateBookingStatusRequest,
};
pub use window::TimeWindow;
