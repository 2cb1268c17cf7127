use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

/// Outbound mail collaborator. Delivery itself is external; the service only
/// needs a dispatch seam it can fire reset codes through.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_reset_code(&self, to: &str, code: &str) -> anyhow::Result<()>;
}

/// Default mailer: records the dispatch in the log. The code itself is never
/// logged.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_reset_code(&self, to: &str, _code: &str) -> anyhow::Result<()> {
        info!(to = %to, "reset code dispatched");
        Ok(())
    }
}

/// Fire-and-forget dispatch: the request path never joins this task, and a
/// delivery failure is logged without being surfaced to the caller.
pub fn dispatch_reset_code(mailer: Arc<dyn Mailer>, to: String, code: String) {
    tokio::spawn(async move {
        if let Err(e) = mailer.send_reset_code(&to, &code).await {
            warn!(error = %e, to = %to, "reset mail dispatch failed");
        }
    });
}
