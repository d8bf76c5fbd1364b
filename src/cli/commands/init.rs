//! init command - Create an empty enlistment

use crate::core::metadata::{MetadataStore, RepoMetadataV1};
use crate::core::paths::EnlistmentPaths;
use crate::core::types::{LayoutRange, LayoutVersion};
use crate::engine::Context;
use crate::git::Git;
use crate::ui::output::{self, Verbosity};
use anyhow::{bail, Context as _, Result};
use std::fs;
use std::path::Path;

/// Create an enlistment at `path`.
///
/// Lays out the dot directory, an empty git repository under `src`, and a
/// metadata record at `layout_version` (default: this build's current
/// version).
pub fn init(ctx: &Context, path: &Path, layout_version: Option<u64>) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let root = if path.is_absolute() {
        path.to_path_buf()
    } else {
        ctx.working_dir()
            .context("Failed to determine working directory")?
            .join(path)
    };
    let paths = EnlistmentPaths::new(root);

    if EnlistmentPaths::is_enlistment_root(paths.root()) {
        bail!("'{}' is already an enlistment", paths.root().display());
    }

    fs::create_dir_all(paths.dot_dir())
        .with_context(|| format!("Failed to create {}", paths.dot_dir().display()))?;
    fs::create_dir_all(paths.repo_root())
        .with_context(|| format!("Failed to create {}", paths.repo_root().display()))?;
    Git::init(&paths.repo_root()).context("Failed to initialize repository")?;

    let version = layout_version
        .map(LayoutVersion::new)
        .unwrap_or_else(|| LayoutRange::this_build().current());
    MetadataStore::new(&paths)
        .save(&RepoMetadataV1::new(version))
        .context("Failed to write repo metadata")?;

    output::print(
        format!(
            "Initialized enlistment at {} (disk layout version {})",
            paths.root().display(),
            version
        ),
        verbosity,
    );
    Ok(())
}
