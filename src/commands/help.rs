// Help command - usage guide sent by DM

use poise::serenity_prelude as serenity;

use crate::utils::config::colors;
use crate::{Context, Error};

const COMMANDS: [(&str, &str); 4] = [
    ("help", "Shows this message."),
    ("configure", "Opens the configuration."),
    ("forget", "Deletes all data stored for this server from this bot."),
    ("ping", "Pings the bot."),
];

fn help_embed(prefix: &str) -> serenity::CreateEmbed {
    COMMANDS.iter().fold(
        serenity::CreateEmbed::new().title("Help").color(colors::ACCENT),
        |embed, (name, about)| embed.field(format!("{}{}", prefix, name), *about, false),
    )
}

/// Show help and usage guide
#[poise::command(prefix_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let embed = help_embed(ctx.data().config.primary_prefix());

    ctx.author()
        .id
        .direct_message(ctx.http(), serenity::CreateMessage::new().embed(embed))
        .await?;

    Ok(())
}
