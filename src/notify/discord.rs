use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::report::{Report, ReportField};

const EMPTY_SECTION: &str = "none";

/// Posts reports to a Discord webhook as one embed per section.
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            webhook_url: webhook_url.into(),
        })
    }
}

fn field_value(field: &ReportField) -> String {
    match &field.url {
        Some(url) => format!("{}\n[Chart]({})", field.value, url),
        None => field.value.clone(),
    }
}

/// `{"embeds":[{title, fields:[{name, value}]}]}`
pub fn embed_payload(report: &Report) -> Value {
    let embeds: Vec<Value> = report
        .sections
        .iter()
        .map(|section| {
            let fields: Vec<Value> = if section.fields.is_empty() {
                vec![json!({ "name": "-", "value": EMPTY_SECTION, "inline": false })]
            } else {
                section
                    .fields
                    .iter()
                    .map(|f| json!({ "name": f.name, "value": field_value(f), "inline": false }))
                    .collect()
            };
            json!({ "title": section.title, "fields": fields })
        })
        .collect();
    json!({ "embeds": embeds })
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, report: &Report) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&embed_payload(report))
            .send()
            .await
            .map_err(|e| Error::NotificationFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::NotificationFailure(format!(
                "Discord webhook returned {}: {}",
                status, body
            )));
        }
        debug!("Discord webhook accepted report ({})", status);
        Ok(())
    }
}
