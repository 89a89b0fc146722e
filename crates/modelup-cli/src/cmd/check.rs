//! Check command

use anyhow::Result;
use crossterm::style::Stylize;

use crate::context::Context;
use crate::ui::{self, NAME_WIDTH, progress::format_transition};

/// List pending updates without installing anything
pub async fn check(ctx: &Context) -> Result<()> {
    let Some(url) = ctx.manifest_url.as_deref() else {
        ui::info(super::NO_UPDATES);
        return Ok(());
    };

    let updater = ctx.updater()?;
    let (_, pending) = updater.check(url).await?;

    if pending.is_empty() {
        ui::success("All models up to date");
        return Ok(());
    }

    println!(
        "{}",
        format!("{} model(s) can be updated", pending.len()).dark_grey()
    );
    for update in &pending {
        let name = format!("{:<width$}", update.name, width = NAME_WIDTH);
        println!(
            "  {} {}",
            name.cyan(),
            format_transition(update.current_version.as_deref(), &update.next_version)
        );
    }
    Ok(())
}
