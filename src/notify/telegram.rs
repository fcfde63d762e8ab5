use async_trait::async_trait;
use log::debug;
use teloxide::prelude::*;

use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::report::Report;

// Telegram rejects messages longer than this.
const MAX_MESSAGE_LEN: usize = 4096;

/// Sends the plain-text rendering of a report to one chat.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let chat_id = config.chat_id.trim().parse::<i64>().map_err(|_| {
            Error::ConfigError(format!("invalid Telegram chat id: {}", config.chat_id))
        })?;
        Ok(Self {
            bot: Bot::new(&config.bot_token),
            chat_id: ChatId(chat_id),
        })
    }
}

fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Splits a line longer than `limit` UTF-16 units at character boundaries.
fn split_line(line: &str, limit: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut units = 0;
    for (i, c) in line.char_indices() {
        let width = c.len_utf16();
        if units + width > limit && i > start {
            pieces.push(&line[start..i]);
            start = i;
            units = 0;
        }
        units += width;
    }
    pieces.push(&line[start..]);
    pieces
}

/// Packs whole lines into chunks of at most `limit` UTF-16 units (Telegram's
/// unit of length). Lines that alone exceed the limit are cut.
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for line in text.lines() {
        for piece in split_line(line, limit) {
            let piece_len = utf16_len(piece);
            if !current.is_empty() && current_len + piece_len + 1 > limit {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(piece);
            current_len += piece_len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, report: &Report) -> Result<()> {
        let text = report.to_plain_text();
        for chunk in split_message(&text, MAX_MESSAGE_LEN) {
            self.bot.send_message(self.chat_id, chunk).await?;
        }
        debug!("Telegram report sent to chat {}", self.chat_id.0);
        Ok(())
    }
}
