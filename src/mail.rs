//! Outbound account mail: activation and password-reset messages.
//!
//! Only the trigger and the payload are modelled here. Delivery is behind the
//! [`Mailer`] trait; the default implementation hands messages to the log.

use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use crate::config::MailConfig;
use crate::users::repo_types::UserAccount;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    AccountActivation,
    PasswordReset,
}

impl MailKind {
    fn subject(self) -> &'static str {
        match self {
            MailKind::AccountActivation => "Activate your account",
            MailKind::PasswordReset => "Reset your password",
        }
    }

    fn path(self) -> &'static str {
        match self {
            MailKind::AccountActivation => "accountactivations",
            MailKind::PasswordReset => "passwordresets",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub kind: MailKind,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub user_id: Uuid,
    pub token: String,
    /// Link carrying the token and email back to the client.
    pub link: String,
}

impl MailMessage {
    fn build(
        cfg: &MailConfig,
        kind: MailKind,
        user: &UserAccount,
        token: &str,
    ) -> anyhow::Result<Self> {
        let base = cfg.base_url.trim_end_matches('/');
        let link = Url::parse_with_params(
            &format!("{base}/{}", kind.path()),
            &[("token", token), ("email", user.email.as_str())],
        )?;
        Ok(Self {
            kind,
            from: cfg.from.clone(),
            to: user.email.clone(),
            subject: kind.subject().to_string(),
            user_id: user.id,
            token: token.to_string(),
            link: link.into(),
        })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, message: MailMessage) -> anyhow::Result<()>;
}

/// Fire-and-forget: a failed delivery is logged, never retried or propagated.
async fn send(
    mailer: &dyn Mailer,
    cfg: &MailConfig,
    kind: MailKind,
    user: &UserAccount,
    token: &str,
) {
    let message = match MailMessage::build(cfg, kind, user, token) {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(
                error = %e,
                user_id = %user.id,
                kind = ?kind,
                "could not build mail link"
            );
            return;
        }
    };
    if let Err(e) = mailer.deliver(message).await {
        tracing::warn!(error = %e, user_id = %user.id, kind = ?kind, "mail delivery failed");
    }
}

pub async fn send_activation_email(
    mailer: &dyn Mailer,
    cfg: &MailConfig,
    user: &UserAccount,
    token: &str,
) {
    send(mailer, cfg, MailKind::AccountActivation, user, token).await
}

pub async fn send_password_reset_email(
    mailer: &dyn Mailer,
    cfg: &MailConfig,
    user: &UserAccount,
    token: &str,
) {
    send(mailer, cfg, MailKind::PasswordReset, user, token).await
}

/// Writes messages to the log instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, message: MailMessage) -> anyhow::Result<()> {
        tracing::info!(
            to = %message.to,
            user_id = %message.user_id,
            kind = ?message.kind,
            "mail queued"
        );
        tracing::debug!(link = %message.link, "mail link");
        Ok(())
    }
}

/// Keeps every delivered message.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: tokio::sync::Mutex<Vec<MailMessage>>,
}

#[cfg(test)]
impl MemoryMailer {
    pub async fn outbox(&self) -> Vec<MailMessage> {
        self.outbox.lock().await.clone()
    }

    pub async fn last(&self) -> Option<MailMessage> {
        self.outbox.lock().await.last().cloned()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for MemoryMailer {
    async fn deliver(&self, message: MailMessage) -> anyhow::Result<()> {
        self.outbox.lock().await.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::test_hasher;
    use crate::users::account::tests::account;
    use crate::users::repo_types::AccountState;

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn deliver(&self, _message: MailMessage) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    fn cfg() -> MailConfig {
        MailConfig {
            from: "noreply@test.local".into(),
            base_url: "https://app.test".into(),
        }
    }

    #[tokio::test]
    async fn activation_payload_carries_token_and_email() {
        let (user, token) = account(&test_hasher(), AccountState::Inactive);
        let mailer = MemoryMailer::default();
        send_activation_email(&mailer, &cfg(), &user, &token).await;

        let sent = mailer.last().await.expect("one message");
        assert_eq!(sent.kind, MailKind::AccountActivation);
        assert_eq!(sent.to, "michael@example.com");
        assert_eq!(sent.user_id, user.id);
        assert_eq!(sent.token, token);
        assert_eq!(
            sent.link,
            format!("https://app.test/accountactivations?token={token}&email=michael%40example.com")
        );
    }

    #[tokio::test]
    async fn reset_link_points_at_reset_page() {
        let (user, _) = account(&test_hasher(), AccountState::Active);
        let mailer = MemoryMailer::default();
        send_password_reset_email(&mailer, &cfg(), &user, "tok").await;
        let sent = mailer.last().await.unwrap();
        assert_eq!(sent.kind, MailKind::PasswordReset);
        assert!(sent.link.starts_with("https://app.test/passwordresets?token=tok&"));
    }

    #[tokio::test]
    async fn link_escapes_every_reserved_and_non_ascii_character() {
        let (mut user, _) = account(&test_hasher(), AccountState::Active);
        user.email = "jösé+1%A@example.com".into();
        let mailer = MemoryMailer::default();
        send_password_reset_email(&mailer, &cfg(), &user, "tok").await;

        let sent = mailer.last().await.unwrap();
        assert_eq!(
            sent.link,
            "https://app.test/passwordresets?token=tok&email=j%C3%B6s%C3%A9%2B1%25A%40example.com"
        );
        let parsed = Url::parse(&sent.link).unwrap();
        let email = parsed.query_pairs().find(|(k, _)| k == "email").map(|(_, v)| v.into_owned());
        assert_eq!(email.as_deref(), Some("jösé+1%A@example.com"));
    }

    #[tokio::test]
    async fn delivery_failure_does_not_propagate() {
        let (user, token) = account(&test_hasher(), AccountState::Inactive);
        send_activation_email(&FailingMailer, &cfg(), &user, &token).await;
    }
}
