//! Applies a pass's provisional matches to the working copies.

use std::collections::HashMap;

use crate::model::{BankRecord, InvoiceRecord, MatchEvent, MatchKey, MatchStatus};

/// A match discovered during a pass, not yet applied.
#[derive(Debug, Clone)]
pub(crate) struct ProvisionalMatch {
    pub key: MatchKey,
    pub fee_cents: i64,
}

/// Commit provisional matches in discovery order. Returns the number applied.
///
/// Provisional matches were evaluated against the pass-start pools, so two of
/// them can claim the same record. Conflict rule: first-discovered-wins — a
/// match whose participants were already claimed earlier in this commit step
/// is dropped entirely. A committed row's match_id is never reassigned.
pub(crate) fn apply_matches(
    invoices: &mut [InvoiceRecord],
    bank: &mut [BankRecord],
    provisional: Vec<ProvisionalMatch>,
    events: &mut Vec<MatchEvent>,
) -> usize {
    let invoice_index: HashMap<String, usize> = invoices
        .iter()
        .enumerate()
        .map(|(i, row)| (row.id.clone(), i))
        .collect();
    let bank_index: HashMap<String, usize> = bank
        .iter()
        .enumerate()
        .map(|(i, row)| (row.id.clone(), i))
        .collect();

    let mut applied = 0;

    for candidate in provisional {
        let Some(&b_idx) = bank_index.get(&candidate.key.bank_id) else {
            continue;
        };
        let Some(inv_idxs) = candidate
            .key
            .invoice_ids
            .iter()
            .map(|id| invoice_index.get(id).copied())
            .collect::<Option<Vec<usize>>>()
        else {
            continue;
        };

        let already_claimed = bank[b_idx].match_id.is_some()
            || inv_idxs.iter().any(|&i| invoices[i].match_id.is_some());
        if already_claimed {
            tracing::debug!(match_id = %candidate.key, "dropping conflicting provisional match");
            continue;
        }

        let rendered = candidate.key.render();
        for &i in &inv_idxs {
            invoices[i].match_id = Some(rendered.clone());
            invoices[i].status = Some(MatchStatus::Matched);
        }
        bank[b_idx].match_id = Some(rendered.clone());
        bank[b_idx].status = Some(candidate.key.rule.bank_status());

        events.push(MatchEvent {
            rule: candidate.key.rule,
            invoice_ids: candidate.key.invoice_ids,
            bank_id: candidate.key.bank_id,
            match_id: rendered,
            fee_cents: candidate.fee_cents,
        });
        applied += 1;
    }

    applied
}
