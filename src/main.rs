// Usher - Rust Edition
// A lightweight Discord bot for greetings, farewells and join/leave logs

mod api;
mod commands;
mod features;
mod models;
mod store;
mod utils;

#[cfg(test)]
mod test_support;

use std::env;
use std::sync::Arc;

use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::firebase::FirebaseClient;
use crate::features::event_waiter::EventWaiter;
use crate::store::{FirestoreStore, JsonFileStore, MemoryStore, SettingsStore};
use crate::utils::config::{split_prefix, AppConfig, StorageBackend};
use crate::utils::symbols::SymbolPool;

/// Application state shared by all commands and events
pub struct Data {
    pub config: AppConfig,
    pub store: Arc<dyn SettingsStore>,
    pub waiter: Arc<EventWaiter>,
    pub symbols: SymbolPool,
}

// Manual Debug impl since the store is a trait object
impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("prefixes", &self.config.prefixes)
            .field("store", &"dyn SettingsStore")
            .field("waiting", &self.waiter.pending())
            .field("symbols", &self.symbols.len())
            .finish()
    }
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

fn get_commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        commands::configure::configure(),
        commands::forget::forget(),
        commands::ping::ping(),
        commands::help::help(),
    ]
}

async fn open_store(storage: &StorageBackend) -> Result<Arc<dyn SettingsStore>, Error> {
    match storage {
        StorageBackend::JsonFiles { dir } => {
            let store = JsonFileStore::open(dir.clone()).await?;
            info!("Storing guild settings in {}", store.dir().display());
            Ok(Arc::new(store))
        }
        StorageBackend::Firestore { key_file } => {
            let http_client = reqwest::Client::builder()
                .user_agent("Usher-Bot/1.0")
                .build()?;
            let firebase = FirebaseClient::from_file(http_client, key_file)?;
            info!("Firebase client initialized");
            Ok(Arc::new(FirestoreStore::new(Arc::new(firebase))))
        }
        StorageBackend::Memory => {
            warn!("Guild settings are kept in memory and lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::UnknownCommand { ctx, msg, .. } => {
            warn!("Unknown command: {}", msg.content);
            let notice = serenity::CreateMessage::new()
                .content(format!("The command `{}` is unknown.", msg.content));
            if let Err(e) = msg.author.id.direct_message(ctx, notice).await {
                warn!("Could not DM {}: {}", msg.author.id, e);
            }
        }
        poise::FrameworkError::CommandCheckFailed { ctx, .. }
        | poise::FrameworkError::GuildOnly { ctx, .. } => {
            info!("Check failed for `{}` by {}", ctx.invocation_string(), ctx.author().id);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command `{}` failed: {:?}", ctx.invocation_string(), error);
            let notice = serenity::CreateMessage::new().content(format!(
                "There was an unknown error executing your command `{}`.",
                ctx.invocation_string()
            ));
            if let Err(e) = ctx.author().id.direct_message(ctx.http(), notice).await {
                warn!("Could not DM {}: {}", ctx.author().id, e);
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!("Event handler failed on {}: {:?}", event.snake_case_name(), error);
        }
        err => {
            error!("Framework error: {}", err);
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "usher_rs=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().expect("Invalid configuration");
    let symbols = SymbolPool::from_file(&config.symbol_pool_file).expect("Invalid symbol pool");
    info!("Loaded {} menu symbols", symbols.len());

    let store = open_store(&config.storage)
        .await
        .expect("Failed to open settings store");

    info!("Starting Usher Bot (Rust Edition)...");

    let token = config.token.clone();
    let activity = serenity::ActivityData::playing(format!("{}help", config.primary_prefix()));
    let prefixes = Arc::new(config.prefixes.clone());

    let data = Data {
        config,
        store,
        waiter: Arc::new(EventWaiter::new()),
        symbols,
    };

    // Setup framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: get_commands(),
            prefix_options: poise::PrefixFrameworkOptions {
                stripped_dynamic_prefix: Some(|_ctx, msg, data| {
                    Box::pin(async move {
                        Ok::<_, Error>(split_prefix(&data.config.prefixes, &msg.content))
                    })
                }),
                case_insensitive_commands: true,
                ..Default::default()
            },
            event_handler: |ctx, event, _framework, data| {
                Box::pin(features::handle_event(ctx, event, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                info!("Bot is ready as {}! Prefixes: {:?}", ready.user.name, prefixes);
                Ok(data)
            })
        })
        .build();

    // MESSAGE_CONTENT and GUILD_MEMBERS are privileged, enable them in the Discord Dev Portal
    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .activity(activity)
        .await
        .expect("Failed to create client");

    // Run with graceful shutdown
    let shard_manager = client.shard_manager.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to register Ctrl+C handler");
        info!("Shutting down...");
        shard_manager.shutdown_all().await;
    });

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    info!("Goodbye!");
}
