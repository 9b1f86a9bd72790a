//! SMTP e-mail channel.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use super::{BatchSummary, ChannelError, NotificationChannel};
use crate::error::{AppError, Result};
use crate::models::{ChannelConfig, SmtpTls};

pub struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailChannel {
    pub fn from_config(config: &ChannelConfig, timeout: Duration) -> Result<Self> {
        let ChannelConfig::Email {
            smtp_host,
            smtp_port,
            smtp_tls,
            username,
            password,
            from,
            to,
        } = config
        else {
            return Err(AppError::channel_setup("email", "not an email channel config"));
        };

        let relay = match smtp_tls.unwrap_or_else(|| SmtpTls::for_port(*smtp_port)) {
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host),
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host),
        };
        let mut builder = relay
            .map_err(|e| AppError::channel_setup("email", e))?
            .credentials(Credentials::new(username.clone(), password.clone()))
            .timeout(Some(timeout));
        if let Some(port) = smtp_port {
            builder = builder.port(*port);
        }

        let from = parse_mailbox(from)?;
        let to = to
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mailer: builder.build(),
            from,
            to,
        })
    }

    fn build_message(&self, summary: &BatchSummary) -> std::result::Result<Message, ChannelError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(summary.headline());
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        builder
            .multipart(MultiPart::alternative_plain_html(
                summary.text(),
                summary.html(),
            ))
            .map_err(|e| ChannelError::Malformed(e.to_string()))
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse()
        .map_err(|e| AppError::channel_setup("email", format!("invalid address '{addr}': {e}")))
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, summary: &BatchSummary) -> std::result::Result<(), ChannelError> {
        let message = self.build_message(summary)?;
        match self.mailer.send(message).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_permanent() => Err(ChannelError::Rejected {
                code: e
                    .status()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "smtp".into()),
                message: e.to_string(),
            }),
            Err(e) => Err(ChannelError::Transport(e.to_string())),
        }
    }
}
