// Formatting helpers for embeds

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;

/// Time shown in join/leave log embeds, e.g. "24 Jul 2020 at 23:02 UTC"
pub fn format_log_time(time: DateTime<Utc>) -> String {
    time.format("%d %b %Y at %H:%M UTC").to_string()
}

/// Channel mention or "None"
pub fn channel_mention(channel: Option<serenity::ChannelId>) -> String {
    match channel {
        Some(id) => format!("<#{}>", id),
        None => "None".to_string(),
    }
}

pub fn flag_label(value: bool) -> &'static str {
    if value {
        "Enabled"
    } else {
        "Disabled"
    }
}
