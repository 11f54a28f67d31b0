pub mod history;
pub mod lookup;
pub mod rebuild;
pub mod revision;
pub mod shared;

use crate::cli::{Commands, GlobalFlags};
use crate::context::AppContext;

/// Route a parsed command to its handler.
pub async fn dispatch(
    command: Commands,
    ctx: &mut AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::History(args) => history::run(&args, ctx, flags).await,
        Commands::Show { id } => lookup::show(&id, ctx, flags).await,
        Commands::Revision(args) => revision::run(&args, ctx, flags).await,
        Commands::Types => lookup::types(ctx, flags).await,
        Commands::Request { request_id } => lookup::request(&request_id, ctx, flags).await,
        Commands::Rebuild { trail_dir } => rebuild::run(trail_dir.as_deref(), ctx, flags).await,
    }
}
