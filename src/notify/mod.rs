//! Delivery of formatted reports.

use async_trait::async_trait;

use crate::error::Result;
use crate::report::Report;

pub mod discord;
pub mod telegram;

pub use discord::DiscordNotifier;
pub use telegram::TelegramNotifier;

/// A report transport. Callers treat delivery as best-effort.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, report: &Report) -> Result<()>;
}
