//! Telegram-facing layer: command replies and the prompt pipeline.
//!
//! Every prompt gets a "processing" placeholder that is always edited to a
//! terminal state; delivery degrades from watermark-free file, to fetched
//! image bytes, to a plain link, to a readable error.

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use mirage_engine::orchestrator::{
    Artifact, GenerationOutcome, GenerationRequest, Orchestrator,
};
use mirage_engine::session::SessionStore;
use mirage_h::HeadlessSession;

/// Telegram photo captions cap at 1024 chars; leave room for the prefix.
const CAPTION_PROMPT_LIMIT: usize = 900;
/// Telegram rejects photo uploads beyond 10 MB.
const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

const WELCOME: &str = "🖼️ Welcome!\n\n\
    Send me a text prompt and I will generate an image for you.\n\n\
    Example: 'a photo of a cat playing in a garden'";

const USAGE: &str = "📖 How to use this bot:\n\n\
    • Send any text prompt to generate an image\n\
    • Generation can take several minutes\n\n\
    Commands:\n\
    /start — welcome message\n\
    /help — this help\n\
    /status — bot and session status";

pub struct AppState {
    pub session: tokio::sync::Mutex<HeadlessSession>,
    pub orchestrator: Orchestrator,
    pub store: SessionStore,
    pub session_loaded: bool,
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    Start,
    Help,
    Status,
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let text = match cmd {
        Command::Start => WELCOME.to_string(),
        Command::Help => USAGE.to_string(),
        Command::Status => status_text(&state).await,
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn status_text(state: &AppState) -> String {
    // A held lock means a generation is in flight, which is itself a
    // ready session.
    let initialized = match state.session.try_lock() {
        Ok(session) => {
            use mirage_engine::driver::BrowserSession;
            session.is_ready().await
        }
        Err(_) => true,
    };

    let mut text = String::from("🟢 Bot is running\n");
    text.push_str(if initialized {
        "🟢 Browser session initialized\n"
    } else {
        "🔴 Browser session not initialized\n"
    });
    text.push_str(&if state.store.exists() {
        format!("🟢 Session file present: {}\n", state.store.path().display())
    } else {
        format!("🔴 Session file missing: {}\n", state.store.path().display())
    });
    text.push_str(if state.session_loaded {
        "🟢 Authentication state loaded at startup"
    } else {
        "🔴 Running unauthenticated"
    });
    text
}

pub async fn handle_prompt(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let prompt = match msg.text().map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.to_string(),
        None => {
            bot.send_message(msg.chat.id, "❌ Please send a text prompt to generate an image.")
                .await?;
            return Ok(());
        }
    };

    let placeholder = bot
        .send_message(msg.chat.id, "⏳ Working on it, this can take a few minutes…")
        .await?;

    info!(chat_id = msg.chat.id.0, "prompt received: {prompt}");
    let request = GenerationRequest {
        prompt: prompt.clone(),
        chat_id: msg.chat.id.0,
    };

    // One generation at a time: the whole browser session is locked for
    // the duration of the request.
    let outcome = {
        let mut session = state.session.lock().await;
        state.orchestrator.run(&mut *session, &request).await
    };

    deliver(&bot, msg.chat.id, placeholder.id, &prompt, outcome).await
}

async fn deliver(
    bot: &Bot,
    chat: ChatId,
    placeholder: MessageId,
    prompt: &str,
    outcome: GenerationOutcome,
) -> ResponseResult<()> {
    match outcome {
        GenerationOutcome::Completed {
            artifact,
            fallback_url,
        } => deliver_completed(bot, chat, placeholder, prompt, artifact, fallback_url).await,
        GenerationOutcome::TimedOut => {
            bot.edit_message_text(
                chat,
                placeholder,
                "⌛ Generation did not complete in time. The site may be busy — please try again.",
            )
            .await?;
            Ok(())
        }
        GenerationOutcome::Failed(reason) => {
            warn!("request failed: {reason}");
            bot.edit_message_text(
                chat,
                placeholder,
                "❌ Something went wrong while processing your request. Please try again.",
            )
            .await?;
            Ok(())
        }
    }
}

async fn deliver_completed(
    bot: &Bot,
    chat: ChatId,
    placeholder: MessageId,
    prompt: &str,
    artifact: Artifact,
    fallback_url: Option<String>,
) -> ResponseResult<()> {
    let caption = caption_for(prompt);

    // Fetch a direct URL into bytes so the user gets an inline photo, not
    // just a link.
    let artifact = match artifact {
        Artifact::DirectUrl(url) => match fetch_image_bytes(&url).await {
            Some(bytes) => Artifact::Bytes(bytes),
            None => Artifact::DirectUrl(url),
        },
        other => other,
    };

    let (photo, link) = match artifact {
        Artifact::LocalFile(path) => (Some(InputFile::file(path)), fallback_url),
        Artifact::Bytes(bytes) => (Some(InputFile::memory(bytes)), fallback_url),
        Artifact::DirectUrl(url) => (None, Some(url)),
    };

    if let Some(photo) = photo {
        match bot.send_photo(chat, photo).caption(caption).await {
            Ok(_) => {
                bot.edit_message_text(chat, placeholder, "🖼️ Your image is ready!")
                    .await?;
                return Ok(());
            }
            Err(e) => warn!("photo upload failed, degrading to link: {e}"),
        }
    }

    let text = match link {
        Some(url) => format!("🖼️ Your image is ready!\n\n📝 Prompt: {prompt}\n🔗 {url}"),
        None => "🖼️ Generation finished, but the image could not be delivered. \
                 Please try again."
            .to_string(),
    };
    bot.edit_message_text(chat, placeholder, text).await?;
    Ok(())
}

fn caption_for(prompt: &str) -> String {
    let mut shown: String = prompt.chars().take(CAPTION_PROMPT_LIMIT).collect();
    if shown.len() < prompt.len() {
        shown.push('…');
    }
    format!("🖼️ 📝 {shown}")
}

/// Best-effort download of a direct image URL. `None` degrades delivery to
/// a plain link.
async fn fetch_image_bytes(url: &str) -> Option<Vec<u8>> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .ok()?;
    let response = client.get(url).send().await.ok()?;
    if !response.status().is_success() {
        warn!("image fetch returned {}", response.status());
        return None;
    }
    let is_image = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("image/"))
        .unwrap_or(true);
    if !is_image {
        return None;
    }
    let bytes = response.bytes().await.ok()?;
    if bytes.is_empty() || bytes.len() > MAX_PHOTO_BYTES {
        return None;
    }
    Some(bytes.to_vec())
}
