//! Single-record and grouping lookups: `show`, `request`, `types`.

use anyhow::bail;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

/// Handle `chron show`.
pub async fn show(id: &str, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match ctx.service.get(id).await? {
        Some(record) => output(&record, flags.format),
        None => bail!("audit record '{id}' not found"),
    }
}

/// Handle `chron request`.
pub async fn request(request_id: &str, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let records = ctx.service.for_request(request_id).await?;
    let limit = usize::try_from(ctx.limit(flags)).unwrap_or(usize::MAX);
    let records: Vec<_> = records.into_iter().take(limit).collect();
    output(&records, flags.format)
}

/// Handle `chron types`.
pub async fn types(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let types = ctx.service.distinct_tracked_types().await?;
    output(&types, flags.format)
}
