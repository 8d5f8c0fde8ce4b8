//! Command set and the simple informational command handlers.

use super::keyboards;
use crate::localization::{t_lang, LocalizationManager};
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::info;

/// Commands the bot understands
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "welcome message")]
    Start,
    #[command(description = "how the application process works")]
    Help,
    #[command(description = "start a new application")]
    Apply,
    #[command(description = "cancel the application in progress")]
    Cancel,
}

/// Handle the /start command
pub async fn handle_start_command(
    bot: &Bot,
    msg: &Message,
    localization: &LocalizationManager,
    lang: &str,
) -> Result<()> {
    if let Some(user) = msg.from.as_ref() {
        info!(user_id = %user.id, lang = %lang, "User started the bot");
    }
    bot.send_message(msg.chat.id, t_lang(localization, "start-message", lang))
        .await?;
    Ok(())
}

/// Handle the /help command
pub async fn handle_help_command(
    bot: &Bot,
    msg: &Message,
    localization: &LocalizationManager,
    lang: &str,
) -> Result<()> {
    bot.send_message(msg.chat.id, t_lang(localization, "help-message", lang))
        .reply_markup(keyboards::remove_keyboard())
        .await?;
    Ok(())
}
