//! Liaison Delivery - Bounded-Retry Delivery and Notifications
//!
//! Hands a payload to exactly one healthy endpoint of a role, or reports once
//! that it could not.
//!
//! # Example
//!
//! ```rust,ignore
//! use liaison_delivery::{DeliveryConfig, DeliveryScheduler, LineNotifier};
//!
//! let scheduler = DeliveryScheduler::new(directory, transport, suppression, Arc::new(LineNotifier::from_env()));
//! let handle = scheduler.submit(
//!     "logic",
//!     "##TYPE:fact## likes(mary, wine).",
//!     DeliveryConfig::default()
//!         .with_failure_message("❌ Error: LogicAgent unavailable. Cannot complete the request."),
//! );
//! let report = handle.wait().await?;
//! ```

pub mod error;
pub mod notify;
pub mod scheduler;

pub use error::{Error, Result};
pub use notify::{env_sink_addr, ChannelNotifier, LineNotifier, Notifier, SinkTarget};
pub use scheduler::{
    DeliveryConfig, DeliveryHandle, DeliveryOutcome, DeliveryProgress, DeliveryReport,
    DeliveryScheduler, DeliveryState,
};
