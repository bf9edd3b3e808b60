//! Three-pass matching engine: exact, fee-tolerant, batch.

use chrono::NaiveDate;

use crate::batch::accumulate;
use crate::commit::{apply_matches, ProvisionalMatch};
use crate::config::{is_psp_narrative, MatchingConfig};
use crate::error::ReconError;
use crate::fee::fee_check;
use crate::model::{BankRecord, InvoiceRecord, MatchKey, ReconOutput, ReconSummary};

/// Run the three passes over defensive copies of both snapshots.
///
/// Each pass collects provisional matches read-only against the pools as they
/// stood at the start of the pass, then commits them in one step; committed
/// rows are out of the pool for every later pass and every later run. Empty
/// input is not an error: the snapshots come back unchanged with a zero
/// summary.
pub fn reconcile(
    invoices: &[InvoiceRecord],
    bank: &[BankRecord],
    config: &MatchingConfig,
) -> Result<ReconOutput, ReconError> {
    config.validate()?;

    if invoices.is_empty() || bank.is_empty() {
        return Ok(ReconOutput {
            invoices: invoices.to_vec(),
            bank: bank.to_vec(),
            summary: ReconSummary::empty(),
        });
    }

    let mut invoices = invoices.to_vec();
    let mut bank = bank.to_vec();
    let mut events = Vec::new();

    let provisional = collect_exact(&invoices, &bank, config);
    let rule1_count = apply_matches(&mut invoices, &mut bank, provisional, &mut events);
    tracing::debug!(rule1_count, "exact pass committed");

    let provisional = collect_fee(&invoices, &bank, config);
    let rule2_count = apply_matches(&mut invoices, &mut bank, provisional, &mut events);
    tracing::debug!(rule2_count, "fee pass committed");

    let provisional = collect_batch(&invoices, &bank, config);
    let rule3_count = apply_matches(&mut invoices, &mut bank, provisional, &mut events);
    tracing::debug!(rule3_count, "batch pass committed");

    Ok(ReconOutput {
        invoices,
        bank,
        summary: ReconSummary { rule1_count, rule2_count, rule3_count, events },
    })
}

fn within_window(a: NaiveDate, b: NaiveDate, window_days: i64) -> bool {
    (a - b).num_days().abs() <= window_days
}

/// Open revenue invoices, ascending by id (deterministic anchor order).
fn open_invoices(invoices: &[InvoiceRecord]) -> Vec<usize> {
    let mut pool: Vec<usize> = invoices
        .iter()
        .enumerate()
        .filter(|(_, row)| row.is_open())
        .map(|(i, _)| i)
        .collect();
    pool.sort_by(|&a, &b| invoices[a].id.cmp(&invoices[b].id));
    pool
}

/// Open inbound bank rows, ascending by id.
fn open_bank(bank: &[BankRecord]) -> Vec<usize> {
    let mut pool: Vec<usize> = bank
        .iter()
        .enumerate()
        .filter(|(_, row)| row.is_open())
        .map(|(i, _)| i)
        .collect();
    pool.sort_by(|&a, &b| bank[a].id.cmp(&bank[b].id));
    pool
}

// ---------------------------------------------------------------------------
// Rule 1 — exact 1:1
// ---------------------------------------------------------------------------

/// Same entity, amount within ±tolerance (inclusive), date within the window.
/// Accepted only when exactly one candidate qualifies; ambiguity is never
/// resolved automatically.
fn collect_exact(
    invoices: &[InvoiceRecord],
    bank: &[BankRecord],
    config: &MatchingConfig,
) -> Vec<ProvisionalMatch> {
    let tolerance = config.amount_tolerance_cents();
    let bank_pool = open_bank(bank);
    let mut matches = Vec::new();

    for &i in &open_invoices(invoices) {
        let invoice = &invoices[i];
        let mut candidates = bank_pool.iter().map(|&b| &bank[b]).filter(|tx| {
            tx.entity == invoice.entity
                && (tx.amount_cents - invoice.amount_cents).abs() <= tolerance
                && within_window(tx.date, invoice.date, config.date_window_days)
        });
        if let (Some(only), None) = (candidates.next(), candidates.next()) {
            matches.push(ProvisionalMatch {
                key: MatchKey::exact(&invoice.id, &only.id),
                fee_cents: 0,
            });
        }
    }

    matches
}

// ---------------------------------------------------------------------------
// Rule 2 — fee-tolerant 1:1
// ---------------------------------------------------------------------------

/// Same entity and window; the first candidate whose amount gap passes the
/// fee test wins. With `only_psp_names` the bank pool is first narrowed to
/// rows whose narrative names a known processor.
fn collect_fee(
    invoices: &[InvoiceRecord],
    bank: &[BankRecord],
    config: &MatchingConfig,
) -> Vec<ProvisionalMatch> {
    let fee_abs = config.psp_fee_abs_cents();
    let mut bank_pool = open_bank(bank);
    if config.only_psp_names {
        bank_pool.retain(|&b| bank[b].narrative().is_some_and(is_psp_narrative));
    }

    let mut matches = Vec::new();

    for &i in &open_invoices(invoices) {
        let invoice = &invoices[i];
        for &b in &bank_pool {
            let tx = &bank[b];
            if tx.entity != invoice.entity
                || !within_window(tx.date, invoice.date, config.date_window_days)
            {
                continue;
            }
            let check = fee_check(invoice.amount_cents, tx.amount_cents, fee_abs, config.psp_fee_pct);
            if check.accepted {
                matches.push(ProvisionalMatch {
                    key: MatchKey::fee(&invoice.id, &tx.id),
                    fee_cents: check.fee_cents,
                });
                break;
            }
        }
    }

    matches
}

// ---------------------------------------------------------------------------
// Rule 3 — batch N:1
// ---------------------------------------------------------------------------

/// Per open bank row, gather same-entity invoices inside the window sorted
/// ascending by date and accumulate greedily (see `batch::accumulate`).
fn collect_batch(
    invoices: &[InvoiceRecord],
    bank: &[BankRecord],
    config: &MatchingConfig,
) -> Vec<ProvisionalMatch> {
    let invoice_pool = open_invoices(invoices);
    let mut matches = Vec::new();

    for &b in &open_bank(bank) {
        let tx = &bank[b];
        let mut candidates: Vec<&InvoiceRecord> = invoice_pool
            .iter()
            .map(|&i| &invoices[i])
            .filter(|invoice| {
                invoice.entity == tx.entity
                    && within_window(invoice.date, tx.date, config.date_window_days)
            })
            .collect();
        if candidates.is_empty() {
            continue;
        }
        candidates.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

        if let Some(pick) = accumulate(
            &candidates,
            tx.amount_cents,
            config.amount_tolerance_cents(),
            config.psp_fee_abs_cents(),
            config.psp_fee_pct,
        ) {
            matches.push(ProvisionalMatch {
                key: MatchKey::batch(&tx.id, pick.invoice_ids),
                fee_cents: pick.fee_cents,
            });
        }
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, InvoiceKind, MatchRule, MatchStatus};
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2031, 3, day).unwrap()
    }

    fn invoice(id: &str, amount_cents: i64, entity: &str, day: u32) -> InvoiceRecord {
        InvoiceRecord {
            id: id.into(),
            date: date(day),
            amount_cents,
            entity: entity.into(),
            kind: InvoiceKind::Revenue,
            invoice_no: None,
            match_id: None,
            status: None,
        }
    }

    fn bank_row(id: &str, amount_cents: i64, entity: &str, day: u32) -> BankRecord {
        BankRecord {
            id: id.into(),
            date: date(day),
            amount_cents,
            entity: entity.into(),
            direction: Direction::In,
            partner: None,
            memo: None,
            match_id: None,
            status: None,
        }
    }

    fn config() -> MatchingConfig {
        MatchingConfig { only_psp_names: false, ..MatchingConfig::default() }
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let out = reconcile(&[], &[bank_row("tx_1", 100, "alpha", 1)], &config()).unwrap();
        assert_eq!(out.summary.total(), 0);
        assert_eq!(out.bank.len(), 1);

        let out = reconcile(&[invoice("inv_1", 100, "alpha", 1)], &[], &config()).unwrap();
        assert_eq!(out.summary.total(), 0);
        assert_eq!(out.invoices.len(), 1);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let bad = MatchingConfig { psp_fee_pct: 1.5, ..MatchingConfig::default() };
        let err = reconcile(
            &[invoice("inv_1", 100, "alpha", 1)],
            &[bank_row("tx_1", 100, "alpha", 1)],
            &bad,
        )
        .unwrap_err();
        assert!(err.to_string().contains("psp_fee_pct"));
    }

    #[test]
    fn exact_match_single_candidate() {
        let out = reconcile(
            &[invoice("inv_1", 10_000, "alpha", 10)],
            &[bank_row("tx_1", 10_030, "alpha", 12)],
            &config(),
        )
        .unwrap();
        assert_eq!(out.summary.rule1_count, 1);
        assert_eq!(out.invoices[0].match_id.as_deref(), Some("Minv_1-tx_1"));
        assert_eq!(out.invoices[0].status, Some(MatchStatus::Matched));
        assert_eq!(out.bank[0].status, Some(MatchStatus::Matched));
    }

    #[test]
    fn ambiguity_is_never_resolved_by_the_exact_pass() {
        // two bank rows both inside tolerance and window: count != 1, no match
        let invoices = vec![invoice("inv_1", 10_000, "alpha", 10)];
        let bank = vec![
            bank_row("tx_1", 10_000, "alpha", 10),
            bank_row("tx_2", 10_010, "alpha", 11),
        ];
        assert!(collect_exact(&invoices, &bank, &config()).is_empty());

        // the full run records no exact match either (a later pass may still
        // claim the invoice on its own terms)
        let out = reconcile(&invoices, &bank, &config()).unwrap();
        assert_eq!(out.summary.rule1_count, 0);
        assert!(out.summary.events.iter().all(|e| e.rule != MatchRule::Exact));
    }

    #[test]
    fn entity_scoping_blocks_cross_entity_match() {
        let out = reconcile(
            &[invoice("inv_1", 10_000, "alpha", 10)],
            &[bank_row("tx_1", 10_000, "beta", 10)],
            &config(),
        )
        .unwrap();
        assert_eq!(out.summary.total(), 0);
    }

    #[test]
    fn date_window_is_symmetric() {
        for day in [2, 8] {
            let out = reconcile(
                &[invoice("inv_1", 10_000, "alpha", 5)],
                &[bank_row("tx_1", 10_000, "alpha", day)],
                &config(),
            )
            .unwrap();
            assert_eq!(out.summary.rule1_count, 1, "day {day} inside ±3 window");
        }
        for day in [1, 9] {
            let out = reconcile(
                &[invoice("inv_1", 10_000, "alpha", 5)],
                &[bank_row("tx_1", 10_000, "alpha", day)],
                &config(),
            )
            .unwrap();
            assert_eq!(out.summary.rule1_count, 0, "day {day} outside ±3 window");
        }
    }

    #[test]
    fn expense_invoices_and_outbound_rows_never_participate() {
        let mut expense = invoice("inv_1", 10_000, "alpha", 10);
        expense.kind = InvoiceKind::Expense;
        let mut outbound = bank_row("tx_2", 10_000, "alpha", 10);
        outbound.direction = Direction::Out;
        let out = reconcile(
            &[expense, invoice("inv_2", 10_000, "alpha", 10)],
            &[outbound, bank_row("tx_1", 10_000, "alpha", 10)],
            &config(),
        )
        .unwrap();
        assert_eq!(out.summary.rule1_count, 1);
        assert_eq!(out.invoices[1].match_id.as_deref(), Some("Minv_2-tx_1"));
        assert!(out.invoices[0].match_id.is_none());
        assert!(out.bank[0].match_id.is_none());
    }

    #[test]
    fn fee_match_first_candidate_wins() {
        // both rows pass the fee test; tx_1 scans first and stops the search
        let out = reconcile(
            &[invoice("inv_1", 10_000, "alpha", 10)],
            &[
                bank_row("tx_1", 9_600, "alpha", 11),
                bank_row("tx_2", 9_700, "alpha", 11),
            ],
            &config(),
        )
        .unwrap();
        assert_eq!(out.summary.rule2_count, 1);
        assert_eq!(out.invoices[0].match_id.as_deref(), Some("Finv_1-tx_1"));
        assert_eq!(out.bank[0].status, Some(MatchStatus::MatchedFee));
        assert!(out.bank[1].match_id.is_none());
        assert_eq!(out.summary.events[0].fee_cents, 400);
    }

    #[test]
    fn psp_filter_restricts_fee_candidates() {
        let mut plain = bank_row("tx_1", 9_600, "alpha", 11);
        plain.partner = Some("ACME GmbH".into());
        let mut psp = bank_row("tx_2", 9_600, "alpha", 11);
        psp.partner = Some("STRIPE PAYOUT".into());

        let cfg = MatchingConfig { only_psp_names: true, ..MatchingConfig::default() };
        let out = reconcile(&[invoice("inv_1", 10_000, "alpha", 10)], &[plain, psp], &cfg).unwrap();
        assert_eq!(out.summary.rule2_count, 1);
        assert_eq!(out.invoices[0].match_id.as_deref(), Some("Finv_1-tx_2"));
    }

    #[test]
    fn psp_filter_falls_back_to_memo() {
        let mut row = bank_row("tx_1", 9_600, "alpha", 11);
        row.memo = Some("payout ref mollie 8841".into());
        let cfg = MatchingConfig { only_psp_names: true, ..MatchingConfig::default() };
        let out = reconcile(&[invoice("inv_1", 10_000, "alpha", 10)], &[row], &cfg).unwrap();
        assert_eq!(out.summary.rule2_count, 1);
    }

    #[test]
    fn batch_match_exact_sum() {
        let out = reconcile(
            &[
                invoice("inv_1", 10_000, "alpha", 8),
                invoice("inv_2", 10_000, "alpha", 9),
                invoice("inv_3", 10_000, "alpha", 10),
            ],
            &[bank_row("tx_1", 30_000, "alpha", 10)],
            &MatchingConfig { amount_tolerance: 0.0, only_psp_names: false, ..MatchingConfig::default() },
        )
        .unwrap();
        assert_eq!(out.summary.rule3_count, 1);
        assert_eq!(out.bank[0].status, Some(MatchStatus::MatchedBatch));
        assert_eq!(out.bank[0].match_id.as_deref(), Some("Btx_1-inv_1,inv_2,inv_3"));
        for row in &out.invoices {
            assert_eq!(row.status, Some(MatchStatus::Matched));
        }
    }

    #[test]
    fn batch_failure_keeps_no_partial_state() {
        let out = reconcile(
            &[invoice("inv_1", 4_000, "alpha", 9), invoice("inv_2", 4_100, "alpha", 10)],
            &[bank_row("tx_1", 30_000, "alpha", 10)],
            &config(),
        )
        .unwrap();
        assert_eq!(out.summary.total(), 0);
        assert!(out.invoices.iter().all(|r| r.match_id.is_none()));
        assert!(out.bank[0].match_id.is_none());
    }

    #[test]
    fn passes_consume_shrinking_pools() {
        // inv_1/tx_1 settle exactly in pass 1; inv_2 then fee-matches tx_2,
        // leaving nothing for the batch pass to claim
        let out = reconcile(
            &[
                invoice("inv_1", 10_000, "alpha", 10),
                invoice("inv_2", 20_000, "alpha", 10),
            ],
            &[
                bank_row("tx_1", 10_000, "alpha", 10),
                bank_row("tx_2", 19_400, "alpha", 11),
            ],
            &config(),
        )
        .unwrap();
        assert_eq!(out.summary.rule1_count, 1);
        assert_eq!(out.summary.rule2_count, 1);
        assert_eq!(out.summary.rule3_count, 0);
    }

    #[test]
    fn idempotent_on_own_output() {
        let invoices = vec![
            invoice("inv_1", 10_000, "alpha", 10),
            invoice("inv_2", 5_000, "beta", 12),
            invoice("inv_3", 5_050, "beta", 13),
        ];
        let bank = vec![
            bank_row("tx_1", 9_700, "alpha", 11),
            bank_row("tx_2", 10_050, "beta", 13),
        ];
        let first = reconcile(&invoices, &bank, &config()).unwrap();
        assert!(first.summary.total() > 0);

        let second = reconcile(&first.invoices, &first.bank, &config()).unwrap();
        assert_eq!(second.summary.total(), 0, "second run must re-match nothing");
        for (before, after) in first.invoices.iter().zip(&second.invoices) {
            assert_eq!(before.match_id, after.match_id);
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let invoices: Vec<InvoiceRecord> = (0..20)
            .map(|n| invoice(&format!("inv_{n:02}"), 5_000 + 100 * n, "alpha", 1 + (n as u32 % 20)))
            .collect();
        let bank: Vec<BankRecord> = (0..10)
            .map(|n| bank_row(&format!("tx_{n:02}"), 4_900 + 200 * n, "alpha", 2 + (n as u32 % 18)))
            .collect();

        let a = reconcile(&invoices, &bank, &config()).unwrap();
        let b = reconcile(&invoices, &bank, &config()).unwrap();

        let ids = |out: &ReconOutput| -> Vec<(String, Option<String>)> {
            out.invoices.iter().map(|r| (r.id.clone(), r.match_id.clone())).collect()
        };
        assert_eq!(ids(&a), ids(&b));
        let tags = |out: &ReconOutput| -> Vec<(MatchRule, String)> {
            out.summary.events.iter().map(|e| (e.rule, e.match_id.clone())).collect()
        };
        assert_eq!(tags(&a), tags(&b));
    }

    #[test]
    fn caller_snapshots_never_mutated() {
        let invoices = vec![invoice("inv_1", 10_000, "alpha", 10)];
        let bank = vec![bank_row("tx_1", 10_000, "alpha", 10)];
        let out = reconcile(&invoices, &bank, &config()).unwrap();
        assert_eq!(out.summary.rule1_count, 1);
        assert!(invoices[0].match_id.is_none());
        assert!(bank[0].match_id.is_none());
    }
}
