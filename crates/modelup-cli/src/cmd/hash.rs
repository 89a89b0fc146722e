//! Hash command

use anyhow::{Context, Result};
use std::path::PathBuf;

use modelup_core::io::checksum::sha256_file;

/// Print `<sha256>  <path>` for each file, like `sha256sum`
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let digest =
            sha256_file(path).with_context(|| format!("Failed to hash {}", path.display()))?;
        println!("{digest}  {}", path.display());
    }
    Ok(())
}
