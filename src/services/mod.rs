//! Service layer.
//!
//! - Tracking commands (`TrackingCommands`)
//! - Notification transport (`Notifier`, `TwilioNotifier`)

mod commands;
mod notifier;

pub use commands::TrackingCommands;
pub use notifier::{Notifier, TwilioNotifier, validate_destination};
