pub mod pricing;
pub mod catalog;
pub mod clients;
pub mod stations;
pub mod reservation;
pub mod booking;
pub mod lifecycle;

pub use booking::AppointmentBookingService;
pub use catalog::CatalogService;
pub use clients::ClientResolverService;
pub use lifecycle::AppointmentLifecycleService;
pub use reservation::SlotReservationService;
pub use stations::StationAllocationService;
