// Realtime synchronization layer: live feeds, derived per-item state,
// optimistic delta mutations and cascade deletes.
pub mod augment;
pub mod cascade;
pub mod feed;
pub mod mutation;
pub mod subscription;

pub use cascade::CascadeDeleteCoordinator;
pub use feed::ForumFeed;
pub use mutation::MutationGateway;
pub use subscription::{FeedEvent, LiveFeed, SubscriptionManager};
