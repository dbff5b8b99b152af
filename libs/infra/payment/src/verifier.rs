use creditcore_domain_models::Invoice;
use rust_decimal::Decimal;
use uuid::Uuid;

/// The parsed form of a gateway's ResultURL callback, independent of which
/// provider sent it.
#[derive(Debug, Clone)]
pub struct WebhookPayload {
    pub out_sum: Decimal,
    pub inv_id: i64,
    pub signature: String,
    pub invoice_id: Uuid,
    pub user_id: i64,
    pub fee: Option<Decimal>,
    pub email: Option<String>,
    pub payment_method: Option<String>,
}

/// A payment gateway adapter. Implemented once per provider; the webhook
/// handler is provider-agnostic above this trait.
#[async_trait::async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// The URL the user is redirected to in order to pay `invoice`.
    fn payment_url(&self, invoice: &Invoice) -> String;

    /// Whether `payload`'s signature is authentic for this provider.
    fn verify(&self, payload: &WebhookPayload) -> bool;

    /// The plaintext body the gateway expects in response to a processed
    /// webhook (Robokassa wants exactly `OK{inv_id}`).
    fn success_response(&self, inv_id: i64) -> String;
}
