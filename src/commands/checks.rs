// Command checks

use poise::serenity_prelude as serenity;

use crate::{Context, Error};

/// Owners and members with an administrator role may configure the bot
pub fn grants_config_access<I>(is_owner: bool, role_permissions: I) -> bool
where
    I: IntoIterator<Item = serenity::Permissions>,
{
    is_owner
        || role_permissions
            .into_iter()
            .any(|p| p.contains(serenity::Permissions::ADMINISTRATOR))
}

pub async fn admin_or_owner(ctx: Context<'_>) -> Result<bool, Error> {
    let Some(member) = ctx.author_member().await else {
        return Ok(false);
    };
    let author = ctx.author().id;

    let allowed = match ctx.guild() {
        Some(guild) => grants_config_access(
            guild.owner_id == author,
            member
                .roles
                .iter()
                .filter_map(|role_id| guild.roles.get(role_id))
                .map(|role| role.permissions),
        ),
        None => false,
    };
    Ok(allowed)
}
