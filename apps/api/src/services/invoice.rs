//! Invoice service (C4): preview, commit, cancel — the orchestration half
//! of `creditcore_domain_billing::invoice`'s pure idempotency-key and TTL
//! math (spec.md §4.3).

use chrono::{DateTime, Utc};
use creditcore_domain_billing::{
    apply_discount, default_expiry, derive_idempotency_key, validate_promo, BillingError,
    BillingResult, PreviewDto, PromoContext,
};
use creditcore_domain_models::{actions, Invoice, InvoiceStatus};
use creditcore_infra_db::repositories::audit::AuditEntry;
use creditcore_infra_db::repositories::invoices::NewInvoice;
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;

/// Pure-read preview: an invalid or missing promo is silently ignored
/// rather than surfaced, per spec.md §4.3.
pub async fn preview(
    state: &AppState,
    user_id: i64,
    tariff_id: Uuid,
    promo_code: Option<&str>,
    now: DateTime<Utc>,
) -> BillingResult<PreviewDto> {
    let tariff = state
        .tariffs
        .get(tariff_id)
        .await
        .map_err(BillingError::from)?
        .ok_or(BillingError::NotFound { entity: "tariff", id: tariff_id.to_string() })?;
    if !tariff.is_active {
        return Err(BillingError::Validation("tariff is not active".into()));
    }

    let promo_row = match promo_code {
        Some(code) => state.promo.get_by_code(code).await.map_err(BillingError::from)?,
        None => None,
    };

    let dto = match &promo_row {
        Some(promo) => {
            let already_activated = state
                .promo
                .has_activation(user_id, tariff_id)
                .await
                .map_err(BillingError::from)?;
            let ctx = PromoContext { now, tariff_id: Some(tariff_id), already_activated_for_tariff: already_activated };
            match validate_promo(Some(promo), ctx) {
                Ok(()) => PreviewDto::with_discount(tariff_id, tariff.tokens, 0, apply_discount(promo, tariff.price)),
                Err(_) => PreviewDto::without_promo(tariff_id, tariff.price, tariff.tokens, 0),
            }
        }
        None => PreviewDto::without_promo(tariff_id, tariff.price, tariff.tokens, 0),
    };

    Ok(dto)
}

/// Commits an invoice: resolves the tariff, validates the promo (a bad
/// promo is a hard failure here, unlike `preview`), derives the hourly
/// idempotency key, disambiguates against any non-pending invoice already
/// parked under that key, and persists.
pub async fn create(
    state: &AppState,
    user_id: i64,
    tariff_id: Uuid,
    promo_code: Option<&str>,
    now: DateTime<Utc>,
) -> BillingResult<Invoice> {
    let tariff = state
        .tariffs
        .get(tariff_id)
        .await
        .map_err(BillingError::from)?
        .ok_or(BillingError::NotFound { entity: "tariff", id: tariff_id.to_string() })?;
    if !tariff.is_active {
        return Err(BillingError::Validation("tariff is not active".into()));
    }

    let promo_row = match promo_code {
        Some(code) => state.promo.get_by_code(code).await.map_err(BillingError::from)?,
        None => None,
    };
    if let Some(promo) = &promo_row {
        let already_activated = state
            .promo
            .has_activation(user_id, tariff_id)
            .await
            .map_err(BillingError::from)?;
        let ctx = PromoContext { now, tariff_id: Some(tariff_id), already_activated_for_tariff: already_activated };
        validate_promo(Some(promo), ctx)?;
    }

    let promo_id = promo_row.as_ref().map(|p| p.id);
    let base_key = derive_idempotency_key(user_id, tariff_id, promo_id, now);

    // Step 1/2 of spec.md §4.3's `create`: a pending invoice under the key
    // is returned as-is; a non-pending one means a distinct new attempt,
    // so we append a disambiguator until we find an unused key.
    let mut candidate_key = base_key.clone();
    let mut suffix: u32 = 0;
    loop {
        match state.invoices.get_by_idempotency_key(&candidate_key).await.map_err(BillingError::from)? {
            Some(existing) if existing.status == InvoiceStatus::Pending => return Ok(existing),
            Some(_non_pending) => {
                suffix += 1;
                candidate_key = format!("{base_key}:{suffix}");
            }
            None => break,
        }
    }

    let (original_amount, final_amount, tokens, discount_description) = match &promo_row {
        Some(promo) => {
            let discount = apply_discount(promo, tariff.price);
            (discount.original, discount.final_amount, tariff.tokens + discount.bonus_tokens, Some(discount.description))
        }
        None => (tariff.price, tariff.price, tariff.tokens, None),
    };

    let expires_at = default_expiry(now, state.config.invoice_ttl_hours);
    let new_invoice = NewInvoice {
        user_id,
        tariff_id,
        promo_id,
        amount: final_amount,
        original_amount,
        tokens,
        subscription_days: 0,
        idempotency_key: candidate_key,
        payment_url: None,
        expires_at,
    };
    let invoice = state.invoices.create_idempotent(new_invoice).await.map_err(BillingError::from)?;

    let payment_url = state.verifier.payment_url(&invoice);
    state.invoices.set_payment_url(invoice.id, &payment_url).await.map_err(BillingError::from)?;

    // Promo usage is incremented at issuance, not at payment — spec.md's
    // open-questions section flags this as the source's actual behavior
    // (a code can be spent by an invoice that later expires unpaid) and
    // this crate keeps it rather than inventing a refund-on-expiry rule.
    if let Some(promo) = &promo_row {
        state
            .promo
            .activate(user_id, tariff_id, promo.id, invoice.tokens, invoice.subscription_days)
            .await
            .map_err(BillingError::from)?;
    }

    state
        .audit
        .record(AuditEntry {
            action: actions::INVOICE_CREATED,
            entity_type: "invoice",
            entity_id: &invoice.id.to_string(),
            user_id: Some(user_id),
            old_value: None,
            new_value: Some(json!({
                "tariff_id": tariff_id,
                "amount": invoice.amount,
                "tokens": invoice.tokens,
                "discount_description": discount_description,
            })),
            metadata: None,
        })
        .await
        .map_err(BillingError::from)?;

    Ok(Invoice { payment_url: Some(payment_url), ..invoice })
}

/// Cancels a still-pending invoice. Anything else is a validation error —
/// the invoice status lattice (spec.md §8) never transitions out of a
/// terminal state, and cancellation is not an exception to that.
pub async fn cancel(state: &AppState, invoice_id: Uuid) -> BillingResult<Invoice> {
    let cancelled = state
        .invoices
        .cancel(invoice_id)
        .await
        .map_err(BillingError::from)?
        .ok_or_else(|| BillingError::Validation("invoice is not pending".into()))?;

    state
        .audit
        .record(AuditEntry {
            action: actions::INVOICE_CANCELLED,
            entity_type: "invoice",
            entity_id: &cancelled.id.to_string(),
            user_id: Some(cancelled.user_id),
            old_value: Some(json!({ "status": "pending" })),
            new_value: Some(json!({ "status": "cancelled" })),
            metadata: None,
        })
        .await
        .map_err(BillingError::from)?;

    Ok(cancelled)
}

/// Bulk-expires every pending invoice whose TTL has lapsed before `now`,
/// auditing the sweep as one entry rather than one per invoice.
pub async fn expire_due(state: &AppState, now: DateTime<Utc>) -> BillingResult<usize> {
    let expired = state.invoices.expire_before(now).await.map_err(BillingError::from)?;
    if !expired.is_empty() {
        state
            .audit
            .record(AuditEntry {
                action: actions::INVOICES_EXPIRED,
                entity_type: "invoice",
                entity_id: "bulk",
                user_id: None,
                old_value: None,
                new_value: Some(json!({ "count": expired.len(), "cutoff": now })),
                metadata: None,
            })
            .await
            .map_err(BillingError::from)?;
    }
    Ok(expired.len())
}

#[cfg(test)]
mod tests {
    // Exercised end-to-end against a real pool in `tests/` once a database
    // fixture is wired up; the pure pieces this module composes
    // (`derive_idempotency_key`, `apply_discount`, `validate_promo`) carry
    // their own unit tests in `creditcore-domain-billing`.
}
