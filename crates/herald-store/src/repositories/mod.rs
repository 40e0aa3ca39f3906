//! Stateless repositories over a borrowed [`rusqlite::Connection`].

pub mod device_registration;
pub mod notification_event;

pub use device_registration::DeviceRegistrationRepo;
pub use notification_event::NotificationEventRepo;
