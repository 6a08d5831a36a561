use anyhow::Context;
use axum::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

/// Outbound mail boundary. Implementations are dispatched fire-and-forget
/// from the handlers; a failure is logged and never fails the request.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_welcome(&self, email: &str, username: &str) -> anyhow::Result<()>;
    async fn send_reset_link(&self, email: &str, username: &str, token: &str)
        -> anyhow::Result<()>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        let from = cfg
            .from
            .parse::<Mailbox>()
            .context("parse SMTP_FROM address")?;
        Ok(Self { transport, from })
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>().context("parse recipient address")?)
            .subject(subject)
            .body(body)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_welcome(&self, email: &str, username: &str) -> anyhow::Result<()> {
        self.send(
            email,
            "Welcome to authgate",
            format!("Hi {username},\n\nYour account has been created.\n"),
        )
        .await
    }

    async fn send_reset_link(
        &self,
        email: &str,
        username: &str,
        token: &str,
    ) -> anyhow::Result<()> {
        self.send(
            email,
            "Password reset",
            format!(
                "Hi {username},\n\nUse this code to reset your password within the next hour:\n\n{token}\n\nIf you did not request this, you can ignore this message.\n"
            ),
        )
        .await
    }
}

/// Stand-in used when no SMTP relay is configured. Logs the dispatch so the
/// flow stays observable in development.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_welcome(&self, email: &str, username: &str) -> anyhow::Result<()> {
        info!(email = %email, username = %username, "welcome mail (smtp not configured)");
        Ok(())
    }

    async fn send_reset_link(
        &self,
        email: &str,
        username: &str,
        _token: &str,
    ) -> anyhow::Result<()> {
        info!(email = %email, username = %username, "reset mail (smtp not configured)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let notifier = LogNotifier;
        notifier
            .send_welcome("a@x.com", "a")
            .await
            .expect("welcome should succeed");
        notifier
            .send_reset_link("a@x.com", "a", "deadbeef")
            .await
            .expect("reset should succeed");
    }

    #[test]
    fn smtp_notifier_rejects_unparseable_from() {
        let cfg = SmtpConfig {
            host: "smtp.example.com".into(),
            username: "mailer".into(),
            password: "secret".into(),
            from: "not an address".into(),
        };
        assert!(SmtpNotifier::new(&cfg).is_err());
    }
}
