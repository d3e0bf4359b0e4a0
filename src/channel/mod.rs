pub mod bus;
pub mod events;
pub mod publisher;

pub use bus::{EventChannel, InMemoryChannel, Subscription};
pub use events::{ChannelEvent, Envelope, INSIGHTS_NAMESPACE, ISSUES_NAMESPACE};
pub use publisher::{FallbackPublisher, PublishOutcome};
