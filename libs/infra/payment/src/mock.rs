use creditcore_domain_models::Invoice;

use crate::signature::{generate_init_signature, verify_result_signature};
use crate::verifier::{PaymentVerifier, WebhookPayload};

/// Local payment simulator. Speaks the exact Robokassa signature formulas
/// against a merchant login and password pair configured for a sandbox,
/// so a deployment can exercise the full invoice/webhook flow without a
/// live gateway contract.
pub struct MockVerifier {
    pub merchant_login: String,
    pub password_1: String,
    pub password_2: String,
    pub base_url: String,
}

impl PaymentVerifier for MockVerifier {
    fn payment_url(&self, invoice: &Invoice) -> String {
        let shp_invoice_id = invoice.id.to_string();
        let shp_user_id = invoice.user_id.to_string();
        let shp_params = [("Shp_invoice_id", shp_invoice_id.as_str()), ("Shp_user_id", shp_user_id.as_str())];

        let signature = generate_init_signature(
            &self.merchant_login,
            invoice.amount,
            invoice.gateway_ref,
            &self.password_1,
            &shp_params,
        );

        let query = serde_urlencoded::to_string([
            ("MerchantLogin", self.merchant_login.as_str()),
            ("OutSum", &invoice.amount.to_string()),
            ("InvId", &invoice.gateway_ref.to_string()),
            ("SignatureValue", &signature),
            ("Culture", "ru"),
            ("Shp_invoice_id", &shp_invoice_id),
            ("Shp_user_id", &shp_user_id),
        ])
        .unwrap_or_default();

        format!("{}/mock-payment?{query}", self.base_url.trim_end_matches('/'))
    }

    fn verify(&self, payload: &WebhookPayload) -> bool {
        let shp_invoice_id = payload.invoice_id.to_string();
        let shp_user_id = payload.user_id.to_string();
        let shp_params = [("Shp_invoice_id", shp_invoice_id.as_str()), ("Shp_user_id", shp_user_id.as_str())];

        verify_result_signature(payload.out_sum, payload.inv_id, &payload.signature, &self.password_2, &shp_params)
    }

    fn success_response(&self, inv_id: i64) -> String {
        format!("OK{inv_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::generate_result_signature;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn sample_verifier() -> MockVerifier {
        MockVerifier {
            merchant_login: "test_merchant".into(),
            password_1: "pw1".into(),
            password_2: "pw2".into(),
            base_url: "https://pay.example".into(),
        }
    }

    fn sample_invoice() -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            gateway_ref: 42,
            user_id: 1001,
            tariff_id: Uuid::new_v4(),
            promo_id: None,
            amount: Decimal::new(19900, 2),
            original_amount: Decimal::new(19900, 2),
            tokens: 1000,
            subscription_days: 30,
            status: creditcore_domain_models::InvoiceStatus::Pending,
            idempotency_key: "k".into(),
            payment_url: None,
            paid_at: None,
            expires_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn generated_payment_url_carries_shp_params() {
        let url = sample_verifier().payment_url(&sample_invoice());
        assert!(url.contains("Shp_invoice_id"));
        assert!(url.contains("Shp_user_id=1001"));
    }

    #[test]
    fn round_trips_a_valid_webhook_signature() {
        let verifier = sample_verifier();
        let invoice = sample_invoice();
        let shp_invoice_id = invoice.id.to_string();
        let shp_user_id = invoice.user_id.to_string();
        let signature = generate_result_signature(
            invoice.amount,
            invoice.gateway_ref,
            &verifier.password_2,
            &[("Shp_invoice_id", &shp_invoice_id), ("Shp_user_id", &shp_user_id)],
        );

        let payload = WebhookPayload {
            out_sum: invoice.amount,
            inv_id: invoice.gateway_ref,
            signature,
            invoice_id: invoice.id,
            user_id: invoice.user_id,
            fee: None,
            email: None,
            payment_method: None,
        };

        assert!(verifier.verify(&payload));
    }
}
