//! # Delivery Collaborator
//!
//! Fire-and-forget delivery of announcement text — speech synthesis, a
//! chat message, a desktop toast. Invoked by local delivery timers or by
//! a backend delivery callback; the mechanism itself is outside the
//! scheduling core.

use async_trait::async_trait;
use log::info;

/// Delivers announcement text to the user.
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Deliver `text`. Failures are reported on the status bus as a
    /// `Failed` event; the core does not retry.
    async fn speak(&self, text: &str) -> anyhow::Result<()>;
}

/// Default [`Announcer`] that writes the announcement to the log.
pub struct LogAnnouncer;

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn speak(&self, text: &str) -> anyhow::Result<()> {
        info!("Announcement: {text}");
        Ok(())
    }
}
