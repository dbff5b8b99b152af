//! The Robokassa MD5 signature scheme, shared by the mock and live
//! providers so a mock payment can be verified with the exact formula the
//! real gateway uses.

use md5::{Digest, Md5};
use rust_decimal::Decimal;

/// Robokassa requires the amount with no trailing zeros: `100.00` -> `100`,
/// `99.50` -> `99.5`.
pub fn format_sum(amount: Decimal) -> String {
    let normalized = amount.normalize();
    if normalized == normalized.trunc() {
        normalized.trunc().to_string()
    } else {
        normalized.to_string()
    }
}

/// `Shp_key1=value1:Shp_key2=value2`, keys sorted alphabetically — the
/// custom parameters fold into both the init and result signatures.
pub fn build_shp_string(shp_params: &[(&str, &str)]) -> String {
    if shp_params.is_empty() {
        return String::new();
    }
    let mut sorted: Vec<_> = shp_params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn md5_hex(data: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `MD5(MerchantLogin:OutSum:InvId:Password1[:Shp_*])`.
pub fn generate_init_signature(
    merchant_login: &str,
    out_sum: Decimal,
    inv_id: i64,
    password_1: &str,
    shp_params: &[(&str, &str)],
) -> String {
    let mut parts = vec![merchant_login.to_string(), format_sum(out_sum), inv_id.to_string(), password_1.to_string()];
    let shp = build_shp_string(shp_params);
    if !shp.is_empty() {
        parts.push(shp);
    }
    md5_hex(&parts.join(":"))
}

/// `MD5(OutSum:InvId:Password2[:Shp_*])`.
pub fn generate_result_signature(
    out_sum: Decimal,
    inv_id: i64,
    password_2: &str,
    shp_params: &[(&str, &str)],
) -> String {
    let mut parts = vec![format_sum(out_sum), inv_id.to_string(), password_2.to_string()];
    let shp = build_shp_string(shp_params);
    if !shp.is_empty() {
        parts.push(shp);
    }
    md5_hex(&parts.join(":"))
}

pub fn verify_result_signature(
    out_sum: Decimal,
    inv_id: i64,
    signature: &str,
    password_2: &str,
    shp_params: &[(&str, &str)],
) -> bool {
    let expected = generate_result_signature(out_sum, inv_id, password_2, shp_params);
    signature.eq_ignore_ascii_case(&expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_sum_strips_trailing_zeros() {
        assert_eq!(format_sum(Decimal::new(10000, 2)), "100");
        assert_eq!(format_sum(Decimal::new(9950, 2)), "99.5");
        assert_eq!(format_sum(Decimal::new(19999, 2)), "199.99");
    }

    #[test]
    fn shp_string_is_sorted_by_key() {
        let params = [("Shp_user_id", "42"), ("Shp_invoice_id", "abc")];
        assert_eq!(build_shp_string(&params), "Shp_invoice_id=abc:Shp_user_id=42");
    }

    #[test]
    fn verify_accepts_case_insensitive_signature() {
        let sig = generate_result_signature(Decimal::new(10000, 2), 7, "secret", &[]);
        assert!(verify_result_signature(Decimal::new(10000, 2), 7, &sig.to_uppercase(), "secret", &[]));
    }

    #[test]
    fn verify_rejects_tampered_amount() {
        let sig = generate_result_signature(Decimal::new(10000, 2), 7, "secret", &[]);
        assert!(!verify_result_signature(Decimal::new(20000, 2), 7, &sig, "secret", &[]));
    }
}
