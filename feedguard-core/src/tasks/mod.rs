pub mod timers;
pub mod watcher;

pub use timers::{TimerId, TimerRegistry};
pub use watcher::{MessageSink, MutationWatcher};
