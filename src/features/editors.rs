// Sub-editors entered from the main configuration menu

use tokio::time::Instant;
use tracing::{debug, info};

use super::config_session::{ConfigSession, SessionError, SubChoice};
use super::event_waiter::WaitOutcome;
use super::menu::{
    render_channel_menu, render_channel_prompt, render_message_menu, render_message_prompt,
    SUB_MENU_MARKERS,
};
use crate::api::discord::{resolve_channel, Card};
use crate::models::guild::{ChannelField, FlagField, MessageField, TemplateString};
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// A new value or an unset was persisted
    Saved,
    /// The user backed out of the sub-menu
    Unchanged,
    /// A flag was flipped; the menu keeps its symbols
    Toggled,
    /// A wait ran out, nothing was persisted
    TimedOut,
}

/// Show a sub-menu and wait for set / unset / cancel
async fn choose(
    session: &mut ConfigSession<'_>,
    card: &Card,
) -> Result<WaitOutcome<SubChoice>, SessionError> {
    session.present(card).await?;
    session.attach_markers(&SUB_MENU_MARKERS).await?;
    Ok(session.wait_for_sub_choice().await)
}

pub async fn edit_channel(
    session: &mut ConfigSession<'_>,
    field: ChannelField,
) -> Result<EditOutcome, SessionError> {
    let deps = session.deps();
    let guild_id = session.guild_id();
    let settings = session.snapshot().await?;

    let choice = match choose(session, &render_channel_menu(field, &settings)).await? {
        WaitOutcome::Matched(choice) => choice,
        WaitOutcome::TimedOut => return Ok(EditOutcome::TimedOut),
    };

    match choice {
        SubChoice::Cancel => return Ok(EditOutcome::Unchanged),
        SubChoice::Unset => {
            store::update(deps.store, guild_id, |s| field.set(s, None)).await?;
            info!("Guild {}: unset the {} channel", guild_id, field.title());
            return Ok(EditOutcome::Saved);
        }
        SubChoice::Confirm => {}
    }

    session.present(&render_channel_prompt(field)).await?;
    let deadline = Instant::now() + deps.timeout;

    loop {
        let reply = match session.wait_for_reply(deadline).await {
            WaitOutcome::Matched(reply) => reply,
            WaitOutcome::TimedOut => return Ok(EditOutcome::TimedOut),
        };

        let channels = deps.surface.text_channels(guild_id).await?;
        let Some(channel_id) = resolve_channel(&channels, &reply.content) else {
            debug!("Guild {}: `{}` is not a text channel", guild_id, reply.content);
            continue;
        };

        store::update(deps.store, guild_id, |s| field.set(s, Some(channel_id))).await?;
        info!(
            "Guild {}: set the {} channel to {}",
            guild_id,
            field.title(),
            channel_id
        );
        session.discard_reply(&reply).await;
        return Ok(EditOutcome::Saved);
    }
}

pub async fn edit_message(
    session: &mut ConfigSession<'_>,
    field: MessageField,
) -> Result<EditOutcome, SessionError> {
    let deps = session.deps();
    let guild_id = session.guild_id();
    let settings = session.snapshot().await?;

    let choice = match choose(session, &render_message_menu(field, &settings)).await? {
        WaitOutcome::Matched(choice) => choice,
        WaitOutcome::TimedOut => return Ok(EditOutcome::TimedOut),
    };

    match choice {
        SubChoice::Cancel => Ok(EditOutcome::Unchanged),
        SubChoice::Unset => {
            store::update(deps.store, guild_id, |s| field.set(s, None)).await?;
            info!("Guild {}: unset the {} message", guild_id, field.title());
            Ok(EditOutcome::Saved)
        }
        SubChoice::Confirm => {
            session.present(&render_message_prompt(field)).await?;

            let deadline = Instant::now() + deps.timeout;
            let reply = match session.wait_for_reply(deadline).await {
                WaitOutcome::Matched(reply) => reply,
                WaitOutcome::TimedOut => return Ok(EditOutcome::TimedOut),
            };

            let template = TemplateString::new(reply.content.clone());
            store::update(deps.store, guild_id, move |s| field.set(s, Some(template))).await?;
            info!("Guild {}: updated the {} message", guild_id, field.title());
            session.discard_reply(&reply).await;
            Ok(EditOutcome::Saved)
        }
    }
}

/// Flip a flag and persist it right away
pub async fn toggle_flag(
    session: &mut ConfigSession<'_>,
    field: FlagField,
) -> Result<EditOutcome, SessionError> {
    let deps = session.deps();
    let guild_id = session.guild_id();

    let settings = store::update(deps.store, guild_id, |s| {
        field.flip(s);
    })
    .await?;
    info!("Guild {}: {:?} is now {}", guild_id, field, field.get(&settings));
    Ok(EditOutcome::Toggled)
}
