pub mod orders;
pub mod status_timeline;
pub mod timeline;

pub use orders::{OrderOverview, OrderService};
pub use status_timeline::{StatusTimeline, Transition};
pub use timeline::{format_hms, Timeline};
