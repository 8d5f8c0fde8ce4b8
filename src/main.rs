use anyhow::Result;
use application_bot::bot::{self, BotDeps, Command};
use application_bot::config::AppConfig;
use application_bot::localization;
use application_bot::questions::QuestionRepository;
use application_bot::rate_limit::RateLimiter;
use application_bot::render::{DocumentRenderer, HtmlRenderer};
use application_bot::session::SessionStore;
use application_bot::temp_store::TempPhotoStore;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Validate configuration early
    let config = Arc::new(AppConfig::from_env()?);
    config.validate()?;
    info!("{}", config.summary());

    let localization =
        localization::create_localization_manager(&config.application.default_lang)?;

    let questions = Arc::new(QuestionRepository::load(config.questions_path())?);
    if questions.is_empty() {
        warn!(
            path = %config.questions_path().display(),
            "No questions loaded; /apply will be rejected until the file is fixed"
        );
    }

    let sessions = Arc::new(SessionStore::new());
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_cooldown()));

    let temp_store = Arc::new(TempPhotoStore::new(config.temp_photo_path()));
    temp_store.ensure_root()?;

    let renderer: Arc<dyn DocumentRenderer> = Arc::new(HtmlRenderer::new(
        config.application_path(),
        Arc::clone(&questions),
        Arc::clone(&localization),
    ));

    let deps = BotDeps {
        config: Arc::clone(&config),
        localization,
        questions,
        sessions,
        rate_limiter,
        temp_store,
        renderer,
    };

    // Initialize the bot with custom client configuration for better reliability
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.bot.http_timeout_secs))
        .build()
        .expect("Failed to create HTTP client");

    let bot = Bot::with_client(config.bot.token.clone(), client);

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(error = %e, "Could not register bot commands");
    }

    // The inactivity watcher runs for the lifetime of the dispatcher
    let _timeout_watcher = bot::spawn_timeout_watcher(bot.clone(), deps.clone());

    info!("Bot initialized, starting dispatcher");

    let handler = Update::filter_message()
        .branch(
            dptree::entry().filter_command::<Command>().endpoint({
                let deps = deps.clone();
                move |bot: Bot, msg: Message, cmd: Command| {
                    let deps = deps.clone();
                    async move { bot::command_handler(bot, msg, cmd, deps).await }
                }
            }),
        )
        .branch(dptree::endpoint({
            let deps = deps.clone();
            move |bot: Bot, msg: Message| {
                let deps = deps.clone();
                async move { bot::message_handler(bot, msg, deps).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
