//! Greedy many-invoices-to-one-bank-row accumulation.

use crate::fee::fee_check;
use crate::model::InvoiceRecord;

/// Accepted batch: chosen invoice ids in scan order, their gross sum, and the
/// implied processor fee (zero for an exact accept).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPick {
    pub invoice_ids: Vec<String>,
    pub gross_cents: i64,
    pub fee_cents: i64,
}

/// Greedily accumulate candidates against a bank target amount.
///
/// `candidates` must already be sorted (ascending by date) by the caller.
/// A candidate that would push the running sum past `target + fee_abs_max`
/// is skipped individually; the scan continues so smaller later invoices can
/// still be picked up. After each inclusion the running state is tested:
/// within `tolerance_cents` of the target is an exact accept, otherwise the
/// fee test may accept the gap. The first acceptable state wins. If the scan
/// exhausts the candidates without acceptance, nothing is kept.
///
/// Inputs are never mutated; all decisions are local to the call. Greedy and
/// intentionally non-optimal: no exploration across invoice subsets.
pub fn accumulate(
    candidates: &[&InvoiceRecord],
    target_cents: i64,
    tolerance_cents: i64,
    fee_abs_max_cents: i64,
    fee_pct_max: f64,
) -> Option<BatchPick> {
    let mut picked: Vec<String> = Vec::new();
    let mut gross: i64 = 0;

    for invoice in candidates {
        if gross + invoice.amount_cents > target_cents + fee_abs_max_cents {
            // would overshoot the cap: skip this one, keep scanning
            continue;
        }
        picked.push(invoice.id.clone());
        gross += invoice.amount_cents;

        if (gross - target_cents).abs() <= tolerance_cents {
            return Some(BatchPick { invoice_ids: picked, gross_cents: gross, fee_cents: 0 });
        }
        let check = fee_check(gross, target_cents, fee_abs_max_cents, fee_pct_max);
        if check.accepted {
            return Some(BatchPick {
                invoice_ids: picked,
                gross_cents: gross,
                fee_cents: check.fee_cents,
            });
        }
    }

    None
}
