//! Telegram transport: command dispatcher and alert delivery.

use crate::commands::{Access, Command, CommandHandler};
use crate::delivery::{DeliveryChannel, DeliveryError, MediaRef};
use crate::webapp::Player;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode, WebAppData, WebAppInfo};
use teloxide::utils::command::BotCommands;
use teloxide::{ApiError, RequestError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] RequestError),
}

/// Map a Bot API failure onto the delivery taxonomy.
/// Only "the chat will never accept us again" counts as permanent.
pub fn classify_error(err: RequestError) -> DeliveryError {
    match err {
        RequestError::Api(api) => match api {
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::UserDeactivated
            | ApiError::CantInitiateConversation
            | ApiError::CantTalkWithBots => DeliveryError::PermanentReject(api.to_string()),
            ApiError::Unknown(msg) if msg.contains("Forbidden") => DeliveryError::PermanentReject(msg),
            other => DeliveryError::Transient(other.to_string()),
        },
        other => DeliveryError::Transient(other.to_string()),
    }
}

/// Sends alerts through the Bot API.
#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send(&self, chat_id: i64, text: &str, media: Option<&MediaRef>) -> Result<(), DeliveryError> {
        let chat = ChatId(chat_id);
        let result = match media {
            Some(MediaRef::LocalFile(path)) => self
                .bot
                .send_animation(chat, InputFile::file(path.clone()))
                .caption(text)
                .parse_mode(ParseMode::Html)
                .await
                .map(|_| ()),
            Some(MediaRef::Url(raw)) => {
                let url = url::Url::parse(raw)
                    .map_err(|e| DeliveryError::Transient(format!("Invalid animation URL {}: {}", raw, e)))?;
                self.bot
                    .send_animation(chat, InputFile::url(url))
                    .caption(text)
                    .parse_mode(ParseMode::Html)
                    .await
                    .map(|_| ())
            }
            None => self
                .bot
                .send_message(chat, text)
                .parse_mode(ParseMode::Html)
                .await
                .map(|_| ()),
        };
        result.map_err(classify_error)
    }
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    commands: CommandHandler,
}

impl TelegramBot {
    pub fn new(bot: Bot, commands: CommandHandler) -> Self {
        Self { bot, commands }
    }

    /// Get the underlying bot for sending messages.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Run the bot command handler until Ctrl+C.
    pub async fn run(self: Arc<Self>) {
        let bot = self.bot.clone();
        if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Failed to register bot commands");
        }

        let commands = Arc::clone(&self);
        let games = Arc::clone(&self);
        let handler = Update::filter_message()
            .branch(dptree::entry().filter_command::<Command>().endpoint(
                move |bot: Bot, msg: Message, cmd: Command| {
                    let this = Arc::clone(&commands);
                    async move { this.handle_command(bot, msg, cmd).await }
                },
            ))
            .branch(
                dptree::filter_map(|msg: Message| msg.web_app_data().cloned()).endpoint(
                    move |bot: Bot, msg: Message, data: WebAppData| {
                        let this = Arc::clone(&games);
                        async move { this.handle_web_app_data(bot, msg, data).await }
                    },
                ),
            );

        info!("Telegram dispatcher started");
        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_command(&self, bot: Bot, msg: Message, cmd: Command) -> Result<(), TelegramError> {
        let access = if self.commands.requires_admin(&cmd) {
            check_access(&bot, &msg).await
        } else {
            Access::Granted
        };

        let markup = self.commands.webapp_button(&cmd).and_then(webapp_markup);
        let text = self.commands.respond(msg.chat.id.0, cmd, access).await;
        let mut request = bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }
        request.await?;
        Ok(())
    }

    async fn handle_web_app_data(&self, bot: Bot, msg: Message, data: WebAppData) -> Result<(), TelegramError> {
        let player = msg
            .from
            .as_ref()
            .map(|user| Player {
                user_id: Some(user.id.0),
                username: user.username.clone(),
                full_name: Some(user.full_name()),
            })
            .unwrap_or_default();
        let text = self.commands.record_game(player, &data.data);
        bot.send_message(msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

/// Inline button that opens the WebApp, if the URL parses.
fn webapp_markup(raw: &str) -> Option<InlineKeyboardMarkup> {
    match url::Url::parse(raw) {
        Ok(url) => Some(InlineKeyboardMarkup::new([[InlineKeyboardButton::web_app(
            "🎮 Launch OG88 Bamboo Bash",
            WebAppInfo { url },
        )]])),
        Err(e) => {
            warn!(url = raw, error = %e, "Invalid WebApp URL, sending without launch button");
            None
        }
    }
}

/// Private chats manage their own alerts; elsewhere the sender must be an
/// administrator or the owner.
async fn check_access(bot: &Bot, msg: &Message) -> Access {
    if msg.chat.is_private() {
        return Access::Granted;
    }
    let Some(user) = msg.from.as_ref() else {
        return Access::Unverified;
    };

    match bot.get_chat_member(msg.chat.id, user.id).await {
        Ok(member) if member.is_privileged() => Access::Granted,
        Ok(_) => Access::Denied,
        Err(e) => {
            warn!(chat_id = msg.chat.id.0, user_id = user.id.0, error = %e, "Unable to verify admin status");
            Access::Unverified
        }
    }
}
