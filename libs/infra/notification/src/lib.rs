//! Telegram delivery adapter for [`creditcore_domain_notification::Notifier`].
//!
//! Formats each [`NotificationKind`] into the Bot API's `sendMessage`
//! payload and classifies delivery failures the way spec.md's C8 wants:
//! a blocked chat is a quiet `warn!`, a bad request is an `error!`, and
//! anything else (timeout, 5xx, transport failure) is also an `error!` —
//! none of them are ever retried, all of them are swallowed here so the
//! caller only ever sees `Ok(())` or a single already-logged `Err`.

use creditcore_domain_notification::{Notification, NotificationKind, Notifier, NotifierError};
use reqwest::{Client, StatusCode};
use serde_json::json;

pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
}

impl TelegramNotifier {
    pub fn new(client: Client, bot_token: String) -> Self {
        Self { client, bot_token }
    }

    fn api_url(&self) -> String {
        format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token)
    }

    fn format(notification: &Notification) -> String {
        let meta = notification.metadata.as_ref();
        let field_i64 = |key: &str| meta.and_then(|m| m.get(key)).and_then(|v| v.as_i64());
        let field_str = |key: &str| meta.and_then(|m| m.get(key)).and_then(|v| v.as_str()).map(str::to_string);

        match notification.kind {
            NotificationKind::BalanceLow => format!(
                "Внимание: низкий баланс токенов.\n\nНа вашем балансе осталось не более {} токенов.\nПополните баланс, чтобы не потерять доступ к сервису.",
                field_i64("threshold").unwrap_or_default()
            ),
            NotificationKind::BalanceDepleted => "Баланс токенов исчерпан.\n\nПополните баланс, чтобы продолжить пользоваться сервисом.".to_string(),
            NotificationKind::SubscriptionExpiringSoon => {
                match field_i64("days_left").unwrap_or_default() {
                    0 => "Ваша подписка истекает сегодня! Продлите подписку, чтобы не потерять доступ.".to_string(),
                    1 => "Ваша подписка истекает завтра! Продлите подписку заранее.".to_string(),
                    days => format!("Ваша подписка истекает через {days} дней."),
                }
            }
            NotificationKind::SubscriptionExpired => {
                "Ваша подписка истекла.\n\nЧтобы продолжить пользоваться сервисом, оформите новую подписку.".to_string()
            }
            NotificationKind::SubscriptionRenewed => format!(
                "Подписка автоматически продлена!\n\nСписано токенов: {}\nОстаток на балансе: {}",
                field_i64("tokens_spent").unwrap_or_default(),
                field_i64("balance_after").unwrap_or_default()
            ),
            NotificationKind::SubscriptionRenewalFailed => format!(
                "Не удалось продлить подписку автоматически.\n\nТребуется: {} токенов\nНа балансе: {} токенов",
                field_i64("required").unwrap_or_default(),
                field_i64("available").unwrap_or_default()
            ),
            NotificationKind::PaymentReceived => {
                format!("Оплата успешно проведена!\n\nСумма: {} ₽", field_str("amount").unwrap_or_default())
            }
            NotificationKind::InvoiceCancelled => "Счёт отменён.".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifierError> {
        let text = Self::format(&notification);
        let body = json!({
            "chat_id": notification.user_id,
            "text": text,
            "parse_mode": "HTML",
        });

        let response = self
            .client
            .post(self.api_url())
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                tracing::error!(error = %err, user_id = notification.user_id, "unexpected error delivering notification");
                NotifierError(err.to_string())
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::FORBIDDEN => {
                tracing::warn!(user_id = notification.user_id, "user has blocked the outbound channel");
                Err(NotifierError("blocked".into()))
            }
            StatusCode::BAD_REQUEST => {
                tracing::error!(user_id = notification.user_id, "malformed notification request");
                Err(NotifierError("malformed".into()))
            }
            status => {
                tracing::error!(%status, user_id = notification.user_id, "unexpected notification delivery failure");
                Err(NotifierError(format!("unexpected status {status}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_balance_low_with_threshold() {
        let notification = Notification::new(1001, NotificationKind::BalanceLow, Some(json!({ "threshold": 20 })));
        let text = TelegramNotifier::format(&notification);
        assert!(text.contains("20"));
    }

    #[test]
    fn formats_subscription_expiring_today_distinctly_from_future_days() {
        let today = Notification::new(1, NotificationKind::SubscriptionExpiringSoon, Some(json!({ "days_left": 0 })));
        let later = Notification::new(1, NotificationKind::SubscriptionExpiringSoon, Some(json!({ "days_left": 3 })));
        assert!(TelegramNotifier::format(&today).contains("сегодня"));
        assert!(TelegramNotifier::format(&later).contains('3'));
    }

    #[test]
    fn missing_metadata_falls_back_to_default_values_without_panicking() {
        let notification = Notification::new(1, NotificationKind::BalanceDepleted, None);
        let text = TelegramNotifier::format(&notification);
        assert!(!text.is_empty());
    }
}
