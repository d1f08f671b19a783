//! API endpoint implementations.

mod notifications;

pub use notifications::NotificationsApi;
