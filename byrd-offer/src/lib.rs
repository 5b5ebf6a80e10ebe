pub mod scheduler;
pub mod service;
pub mod validation;

pub use scheduler::{LifecycleScheduler, SweepReport};
pub use service::{NewOffer, OfferService, OfferUpdate};
