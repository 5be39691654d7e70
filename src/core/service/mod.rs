//! Cross-cutting services.

pub mod alerts;
pub mod notifier;
pub mod resolution;
pub mod shutdown;

pub use notifier::{ConsoleNotifier, NoopNotifier, Notifier, NotifyEvent};
pub use shutdown::{ShutdownController, ShutdownSignal};
