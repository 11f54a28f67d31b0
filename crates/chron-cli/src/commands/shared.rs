use anyhow::Context;
use chrono::{DateTime, Utc};
use chron_core::target::TargetRef;

use crate::cli::root_commands::TargetArgs;

pub fn parse_timestamp(value: &str, flag: &str) -> anyhow::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid --{flag} '{value}': expected an RFC 3339 timestamp"))
}

pub fn target(args: &TargetArgs) -> anyhow::Result<TargetRef> {
    let target = TargetRef::new(args.target_type.as_str(), &args.target_id);
    target.validate()?;
    Ok(target)
}
