// Configure command - opens the reaction menu for this guild

use crate::api::discord::SerenitySurface;
use crate::commands::checks::admin_or_owner;
use crate::features::config_session::{ConfigSession, SessionDeps};
use crate::{Context, Error};

/// Open the configuration menu
#[poise::command(prefix_command, guild_only, check = "admin_or_owner")]
pub async fn configure(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let data = ctx.data();
    let surface = SerenitySurface::new(ctx.serenity_context().http.clone());

    let deps = SessionDeps {
        store: data.store.as_ref(),
        waiter: data.waiter.as_ref(),
        surface: &surface,
        symbols: &data.symbols,
        timeout: data.config.session_timeout,
    };

    ConfigSession::open(deps, guild_id, ctx.channel_id(), ctx.author().id)
        .await?
        .run()
        .await?;

    Ok(())
}
