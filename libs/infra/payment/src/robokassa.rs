use creditcore_domain_models::Invoice;

use crate::signature::{generate_init_signature, verify_result_signature};
use crate::verifier::{PaymentVerifier, WebhookPayload};

/// The live Robokassa gateway. Same signature formulas as
/// [`crate::mock::MockVerifier`] — Robokassa's own init/result endpoints
/// replace the mock's local ones.
pub struct RobokassaVerifier {
    pub merchant_login: String,
    pub password_1: String,
    pub password_2: String,
    pub is_test: bool,
}

const INIT_URL: &str = "https://auth.robokassa.ru/Merchant/Index.aspx";

impl PaymentVerifier for RobokassaVerifier {
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

        let mut params = vec![
            ("MerchantLogin".to_string(), self.merchant_login.clone()),
            ("OutSum".to_string(), invoice.amount.to_string()),
            ("InvId".to_string(), invoice.gateway_ref.to_string()),
            ("SignatureValue".to_string(), signature),
            ("Culture".to_string(), "ru".to_string()),
            ("Shp_invoice_id".to_string(), shp_invoice_id),
            ("Shp_user_id".to_string(), shp_user_id),
        ];
        if self.is_test {
            params.push(("IsTest".to_string(), "1".to_string()));
        }

        let query = serde_urlencoded::to_string(&params).unwrap_or_default();
        format!("{INIT_URL}?{query}")
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
