//! Update command

use anyhow::{Result, bail};
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::ui::{self, LineReporter};

/// Install every pending update, one model per line
pub async fn update(ctx: &Context) -> Result<()> {
    let Some(url) = ctx.manifest_url.as_deref() else {
        ui::info(super::NO_UPDATES);
        return Ok(());
    };

    let updater = ctx.updater()?;
    let (remote, pending) = updater.check(url).await?;
    if pending.is_empty() {
        ui::success("All models up to date");
        return Ok(());
    }

    // Ctrl-C rolls back the model in flight instead of leaving a .part behind.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let reporter = LineReporter::default();
    let report = updater.update_all(&remote, &reporter, &cancel).await;
    ctrl_c.abort();
    let report = report?;

    let failed = report.failures().count();
    if failed > 0 {
        bail!(
            "{failed} of {} model(s) failed to update",
            report.outcomes.len()
        );
    }

    ui::success(&format!("Updated {} model(s)", report.updated_count()));
    Ok(())
}
