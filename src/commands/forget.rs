use tracing::info;

use crate::commands::checks::admin_or_owner;
use crate::{Context, Error};

/// Delete everything stored for this guild
#[poise::command(prefix_command, guild_only, check = "admin_or_owner")]
pub async fn forget(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    ctx.data().store.delete(guild_id).await?;
    info!("Settings of guild {} deleted by {}", guild_id, ctx.author().id);

    ctx.say("All data deleted.").await?;
    Ok(())
}
