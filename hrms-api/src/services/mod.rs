//! Side-effect services used by the handlers

pub mod mailer;
pub mod notifier;
pub mod scheduler;
