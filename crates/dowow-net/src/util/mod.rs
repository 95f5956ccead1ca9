pub mod deadline;
pub mod wake;

pub use deadline::Deadline;
pub use wake::Notifier;
