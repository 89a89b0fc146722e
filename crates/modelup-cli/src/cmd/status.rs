//! Status command to verify installed models without network access
use anyhow::{Result, bail};
use crossterm::style::Stylize;
use std::path::Path;

use modelup_core::UpdateError;
use modelup_core::io::checksum::sha256_file_async;
use modelup_schema::{Manifest, ModelEntry};

use crate::context::Context;
use crate::ui::{self, NAME_WIDTH, display_version, format_size};

/// On-disk state of one recorded model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    /// Present and matches the recorded digest.
    Verified,
    /// Present, but no digest was recorded.
    Unverified,
    /// Recorded but absent.
    Missing,
    /// Present with different content.
    Mismatch { actual: String },
    /// Present but could not be read.
    Unreadable(String),
}

impl Health {
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            Self::Missing | Self::Mismatch { .. } | Self::Unreadable(_)
        )
    }

    fn label(&self) -> String {
        match self {
            Self::Verified => "ok".green().to_string(),
            Self::Unverified => "present (no checksum)".dark_grey().to_string(),
            Self::Missing => "missing".red().to_string(),
            Self::Mismatch { .. } => "checksum mismatch".red().to_string(),
            Self::Unreadable(e) => format!("unreadable: {e}").red().to_string(),
        }
    }
}

/// Compare the artifact at `path` against its manifest entry.
pub async fn check_entry(path: &Path, entry: &ModelEntry) -> Health {
    match tokio::fs::try_exists(path).await {
        Ok(true) => {}
        Ok(false) => return Health::Missing,
        Err(e) => return Health::Unreadable(e.to_string()),
    }

    let Some(expected) = &entry.sha256 else {
        return Health::Unverified;
    };

    match sha256_file_async(path).await {
        Ok(actual) if expected.matches(actual.as_str()) => Health::Verified,
        Ok(actual) => Health::Mismatch {
            actual: actual.to_string(),
        },
        Err(e) => Health::Unreadable(e.to_string()),
    }
}

/// Transient files an interrupted install leaves in the models directory.
fn leftovers(models_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(models_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.ends_with(".part") || n.ends_with(".bak"))
        .collect();
    names.sort();
    names
}

/// Print recorded models and verify each file on disk
pub async fn status(ctx: &Context) -> Result<()> {
    let manifest = Manifest::load(&ctx.manifest_path)
        .map_err(|e| UpdateError::manifest(&ctx.manifest_path, e))?;

    let label_width = 12;
    println!();
    println!("{}", "Model status".dark_grey());
    println!();
    println!(
        "{:<width$}{}",
        "Models:",
        ctx.models_dir.display(),
        width = label_width
    );
    println!(
        "{:<width$}{}",
        "Manifest:",
        ctx.manifest_path.display(),
        width = label_width
    );
    println!(
        "{:<width$}{} recorded",
        "Installed:",
        manifest.models.len(),
        width = label_width
    );
    println!();

    let mut problems = 0;
    for (name, entry) in &manifest.models {
        let path = ctx.models_dir.join(&entry.file);
        let health = check_entry(&path, entry).await;
        if health.is_problem() {
            problems += 1;
        }

        let size = std::fs::metadata(&path)
            .map(|m| format_size(m.len()))
            .unwrap_or_default();
        let updated = entry
            .updated_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let name = format!("{name:<NAME_WIDTH$}");

        println!(
            "  {} {:<10} {:<10} {:<12} {}",
            name.cyan(),
            display_version(&entry.version),
            size,
            updated,
            health.label()
        );
        if let Health::Mismatch { actual } = &health {
            tracing::debug!(file = %path.display(), %actual, "recorded digest does not match");
        }
    }

    let stray = leftovers(&ctx.models_dir);
    if !stray.is_empty() {
        println!();
        ui::warning(&format!(
            "Leftovers from an interrupted install (cleaned up by the next update): {}",
            stray.join(", ")
        ));
    }

    println!();
    if problems > 0 {
        bail!("{problems} model(s) failed verification");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelup_core::io::checksum::sha256_bytes;
    use tempfile::TempDir;

    fn entry(sha256: Option<&[u8]>) -> ModelEntry {
        ModelEntry {
            version: "1.0.0".into(),
            file: "m.bin".into(),
            sha256: sha256.map(sha256_bytes),
            url: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_check_entry_states() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("m.bin");

        assert_eq!(check_entry(&path, &entry(None)).await, Health::Missing);

        std::fs::write(&path, b"weights").unwrap();
        assert_eq!(check_entry(&path, &entry(None)).await, Health::Unverified);
        assert_eq!(
            check_entry(&path, &entry(Some(b"weights".as_slice()))).await,
            Health::Verified
        );

        let health = check_entry(&path, &entry(Some(b"other".as_slice()))).await;
        assert!(matches!(health, Health::Mismatch { .. }));
        assert!(health.is_problem());
    }

    #[test]
    fn test_leftovers_lists_part_and_bak() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.bin"), b"").unwrap();
        std::fs::write(temp.path().join("a.bin.part"), b"").unwrap();
        std::fs::write(temp.path().join("b.bin.bak"), b"").unwrap();

        assert_eq!(leftovers(temp.path()), vec!["a.bin.part", "b.bin.bak"]);
        assert!(leftovers(&temp.path().join("missing")).is_empty());
    }
}
