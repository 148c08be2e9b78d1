// Menu rendering for the configuration session
// Pure functions: settings snapshot in, card out

use crate::api::discord::Card;
use crate::models::guild::{ChannelField, FlagField, GuildSettings, MessageField, TemplateString};
use crate::utils::config::{CANCEL_SYMBOL, CONFIRM_SYMBOL, UNSET_SYMBOL};
use crate::utils::formatters::{channel_mention, flag_label};
use crate::utils::symbols::{MenuSymbols, MENU_SLOTS};

/// Embed field values are capped by Discord
const FIELD_VALUE_LIMIT: usize = 1024;

/// What selecting a main-menu slot does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    EditChannel(ChannelField),
    EditMessage(MessageField),
    Toggle(FlagField),
}

impl MenuAction {
    fn label(self) -> &'static str {
        match self {
            MenuAction::EditChannel(ChannelField::Greet) => "Greetings & farewell channel",
            MenuAction::EditChannel(ChannelField::Log) => "Log channel",
            MenuAction::EditMessage(MessageField::Greeting) => "Greeting message",
            MenuAction::EditMessage(MessageField::Farewell) => "Farewell message",
            MenuAction::Toggle(FlagField::LogJoin) => "Log joins",
            MenuAction::Toggle(FlagField::LogLeave) => "Log leaves",
        }
    }
}

/// Slot order of the main menu; slot `i` is bound to symbol `i`
pub const MENU_ACTIONS: [MenuAction; MENU_SLOTS] = [
    MenuAction::EditChannel(ChannelField::Greet),
    MenuAction::EditChannel(ChannelField::Log),
    MenuAction::EditMessage(MessageField::Greeting),
    MenuAction::EditMessage(MessageField::Farewell),
    MenuAction::Toggle(FlagField::LogJoin),
    MenuAction::Toggle(FlagField::LogLeave),
];

/// Which action a main-menu reaction selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Action(MenuAction),
    Cancel,
}

pub fn choice_for(symbols: &MenuSymbols, symbol: &str) -> Option<MenuChoice> {
    if symbol == CANCEL_SYMBOL {
        return Some(MenuChoice::Cancel);
    }
    symbols
        .position(symbol)
        .map(|slot| MenuChoice::Action(MENU_ACTIONS[slot]))
}

/// Reactions attached under the main menu, cancel last
pub fn main_menu_markers(symbols: &MenuSymbols) -> Vec<String> {
    symbols
        .iter()
        .chain(std::iter::once(CANCEL_SYMBOL))
        .map(str::to_string)
        .collect()
}

/// Reactions attached under a sub-editor menu
pub const SUB_MENU_MARKERS: [&str; 3] = [CONFIRM_SYMBOL, UNSET_SYMBOL, CANCEL_SYMBOL];

fn field_value(text: &str) -> String {
    if text.trim().is_empty() {
        return "*(empty)*".to_string();
    }
    if text.chars().count() <= FIELD_VALUE_LIMIT {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(FIELD_VALUE_LIMIT - 3).collect();
    cut.push_str("...");
    cut
}

fn template_value(template: Option<&TemplateString>) -> String {
    match template {
        Some(t) => field_value(&t.preview()),
        None => "None".to_string(),
    }
}

fn action_value(action: MenuAction, settings: &GuildSettings) -> String {
    match action {
        MenuAction::EditChannel(field) => channel_mention(field.get(settings)),
        MenuAction::EditMessage(field) => template_value(field.get(settings)),
        MenuAction::Toggle(field) => flag_label(field.get(settings)).to_string(),
    }
}

/// The main configuration menu
pub fn render_main_menu(settings: &GuildSettings, symbols: &MenuSymbols) -> Card {
    MENU_ACTIONS
        .iter()
        .enumerate()
        .fold(Card::new("Configuration"), |card, (slot, action)| {
            card.field(
                format!("{} {}", symbols.get(slot), action.label()),
                action_value(*action, settings),
                matches!(action, MenuAction::Toggle(_)),
            )
        })
}

pub fn render_channel_menu(field: ChannelField, settings: &GuildSettings) -> Card {
    Card::new(format!("Updating the {} channel", field.title()))
        .description(format!(
            "React with the appropriate emoji:\n\n{} Set the channel\n\n{} Unset the channel\n\n{} Cancel",
            CONFIRM_SYMBOL, UNSET_SYMBOL, CANCEL_SYMBOL
        ))
        .field("Currently set to", channel_mention(field.get(settings)), false)
}

pub fn render_channel_prompt(field: ChannelField) -> Card {
    Card::new(format!("Setting the {} channel", field.title()))
        .description("Please reply with the channel mention. (The name with a `#` in front).")
}

pub fn render_message_menu(field: MessageField, settings: &GuildSettings) -> Card {
    Card::new(format!("Updating the {} message", field.title()))
        .description(format!(
            "React with the appropriate emoji:\n\n{} Update the message\n\n{} Unset the message\n\n{} Cancel",
            CONFIRM_SYMBOL, UNSET_SYMBOL, CANCEL_SYMBOL
        ))
        .field("Currently set to", template_value(field.get(settings)), false)
}

pub fn render_message_prompt(field: MessageField) -> Card {
    Card::new(format!("Setting the {} message", field.title())).description(
        "Please reply with the message you would like to set.\n\
         Use `{username}` as a placeholder for the user's username.",
    )
}
