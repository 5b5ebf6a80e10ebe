pub mod channel;
pub mod dispatcher;
pub mod helpers;
pub mod preferences;
pub mod quiet_hours;

pub use channel::{ChannelKind, DeliveryChannel, DeliveryError};
pub use dispatcher::{DispatchOutcome, NotificationDispatcher, NotifyRequest};
pub use preferences::PreferencesUpdate;
