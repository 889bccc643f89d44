mod performance;
mod subscription;

pub use performance::{FestivalDay, LineupEntry, Performance};
pub use subscription::{LeadTime, NewSubscription, Subscription};
