use chron_db::repos::revision::RevisionBound;
use serde_json::Value;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::RevisionArgs;
use crate::commands::shared::{parse_timestamp, target};
use crate::context::AppContext;
use crate::output::output;

/// Handle `chron revision`.
pub async fn run(args: &RevisionArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let target = target(&args.target)?;

    if args.all {
        let states = ctx.service.revisions(&target).await?;
        return output(&states, flags.format);
    }

    let bound = RevisionBound {
        to_version: args.to_version,
        up_until: args
            .at
            .as_deref()
            .map(|value| parse_timestamp(value, "at"))
            .transpose()?,
    };
    let state = ctx.service.reconstruct(&target, bound).await?;
    if state.is_empty() {
        tracing::warn!(target_ref = %target, "no history at this point");
    }

    output(
        &serde_json::json!({
            "target_type": target.kind,
            "target_id": target.id,
            "version": state.version,
            "attributes": Value::Object(state.attributes.into_iter().collect()),
        }),
        flags.format,
    )
}
