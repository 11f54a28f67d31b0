use std::path::PathBuf;

use anyhow::Context;
use chron_db::trail::replayer::TrailReplayer;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

/// Handle `chron rebuild`.
pub async fn run(
    trail_dir: Option<&str>,
    ctx: &mut AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let dir = trail_dir
        .map(PathBuf::from)
        .or_else(|| ctx.config.store.trail_path())
        .context("no trail directory: pass --trail-dir or set store.trail_dir")?;

    let report = TrailReplayer::rebuild(&mut ctx.service, &dir)
        .await
        .with_context(|| format!("failed to rebuild from {}", dir.display()))?;
    output(&report, flags.format)
}
