use chron_core::entities::AuditRecord;
use chron_core::enums::{AuditAction, SortOrder};
use chron_db::repos::cursor::AuditQuery;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::HistoryArgs;
use crate::commands::shared::{parse_timestamp, target};
use crate::context::AppContext;
use crate::output::output;

/// Handle `chron history`.
pub async fn run(args: &HistoryArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let records = fetch(args, ctx, flags).await?;
    output(&records, flags.format)
}

pub async fn fetch(
    args: &HistoryArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Vec<AuditRecord>> {
    let query = AuditQuery {
        order: if args.desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        },
        from_version: args.from_version,
        to_version: args.to_version,
        up_until: args
            .until
            .as_deref()
            .map(|value| parse_timestamp(value, "until"))
            .transpose()?,
        action: args
            .action
            .as_deref()
            .map(str::parse::<AuditAction>)
            .transpose()?,
        limit: Some(ctx.limit(flags)),
    };

    let target = target(&args.target)?;
    Ok(ctx.service.query(&target, query).collect_all().await?)
}
