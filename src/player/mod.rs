pub mod engine;
pub mod queue;
pub mod registry;

pub use engine::{BatchEnqueued, Enqueued, GuildPlayer, PlayerView};
pub use registry::PlayerRegistry;
