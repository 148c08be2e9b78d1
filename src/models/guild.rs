use poise::serenity_prelude as serenity;
use serde::{Deserialize, Serialize};

/// Placeholder replaced with the member's name when a template is posted
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// How a placeholder is shown in menu previews
pub const PREVIEW_USERNAME: &str = "**USER**";

/// A user-supplied message body with at most the `{username}` placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateString(String);

impl TemplateString {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute the placeholder with a specific user's name
    pub fn render(&self, username: &str) -> String {
        self.0.replace(USERNAME_PLACEHOLDER, username)
    }

    /// Rendering used inside the configuration menu
    pub fn preview(&self) -> String {
        self.render(PREVIEW_USERNAME)
    }
}

/// Guild (Server) specific settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GuildSettings {
    /// Channel for greetings and farewells
    pub greet_channel: Option<serenity::ChannelId>,
    /// Channel for join/leave log embeds
    pub log_channel: Option<serenity::ChannelId>,
    pub greet_message: Option<TemplateString>,
    pub farewell_message: Option<TemplateString>,
    pub log_join: bool,
    pub log_leave: bool,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            greet_channel: None,
            log_channel: None,
            greet_message: None,
            farewell_message: None,
            log_join: true,
            log_leave: true,
        }
    }
}

/// Channel slots editable from the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelField {
    Greet,
    Log,
}

impl ChannelField {
    pub fn title(self) -> &'static str {
        match self {
            ChannelField::Greet => "greetings",
            ChannelField::Log => "log",
        }
    }

    pub fn get(self, settings: &GuildSettings) -> Option<serenity::ChannelId> {
        match self {
            ChannelField::Greet => settings.greet_channel,
            ChannelField::Log => settings.log_channel,
        }
    }

    pub fn set(self, settings: &mut GuildSettings, value: Option<serenity::ChannelId>) {
        match self {
            ChannelField::Greet => settings.greet_channel = value,
            ChannelField::Log => settings.log_channel = value,
        }
    }
}

/// Template slots editable from the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageField {
    Greeting,
    Farewell,
}

impl MessageField {
    pub fn title(self) -> &'static str {
        match self {
            MessageField::Greeting => "greeting",
            MessageField::Farewell => "farewell",
        }
    }

    pub fn get(self, settings: &GuildSettings) -> Option<&TemplateString> {
        match self {
            MessageField::Greeting => settings.greet_message.as_ref(),
            MessageField::Farewell => settings.farewell_message.as_ref(),
        }
    }

    pub fn set(self, settings: &mut GuildSettings, value: Option<TemplateString>) {
        match self {
            MessageField::Greeting => settings.greet_message = value,
            MessageField::Farewell => settings.farewell_message = value,
        }
    }
}

/// Boolean slots toggled from the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagField {
    LogJoin,
    LogLeave,
}

impl FlagField {
    pub fn get(self, settings: &GuildSettings) -> bool {
        match self {
            FlagField::LogJoin => settings.log_join,
            FlagField::LogLeave => settings.log_leave,
        }
    }

    pub fn flip(self, settings: &mut GuildSettings) -> bool {
        let slot = match self {
            FlagField::LogJoin => &mut settings.log_join,
            FlagField::LogLeave => &mut settings.log_leave,
        };
        *slot = !*slot;
        *slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = GuildSettings::default();
        assert_eq!(settings.greet_channel, None);
        assert_eq!(settings.log_channel, None);
        assert_eq!(settings.greet_message, None);
        assert_eq!(settings.farewell_message, None);
        assert!(settings.log_join);
        assert!(settings.log_leave);
    }

    #[test]
    fn test_template_render() {
        let template = TemplateString::new("Welcome {username}!");
        assert_eq!(template.render("Mika"), "Welcome Mika!");
        assert_eq!(template.preview(), "Welcome **USER**!");
        assert_eq!(template.as_str(), "Welcome {username}!");
    }

    #[test]
    fn test_serialized_shape() {
        let mut settings = GuildSettings::default();
        settings.greet_channel = Some(serenity::ChannelId::new(42));
        settings.greet_message = Some(TemplateString::new("hi {username}"));

        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["greetMessage"], "hi {username}");
        assert_eq!(value["logJoin"], true);
        assert!(value["logChannel"].is_null());

        let back: GuildSettings = serde_json::from_value(value).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_partial_record_fills_defaults() {
        let settings: GuildSettings =
            serde_json::from_value(serde_json::json!({ "logJoin": false })).unwrap();
        assert!(!settings.log_join);
        assert!(settings.log_leave);
        assert_eq!(settings.greet_channel, None);

        let empty: GuildSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, GuildSettings::default());
    }

    #[test]
    fn test_flag_flip() {
        let mut settings = GuildSettings::default();
        assert!(!FlagField::LogLeave.flip(&mut settings));
        assert!(!settings.log_leave);
        assert!(FlagField::LogLeave.flip(&mut settings));
        assert!(settings.log_join);
    }
}
