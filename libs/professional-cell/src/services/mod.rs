pub mod timegrid;
pub mod availability;
pub mod schedule;

pub use availability::AvailabilityService;
pub use schedule::ScheduleService;
