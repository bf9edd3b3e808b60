use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Money helpers
// ---------------------------------------------------------------------------

/// Parse a decimal amount string ("1234.56") into cents.
///
/// Rounds to the nearest cent so floating noise in the input never reaches an
/// amount comparison.
pub fn amount_cents_from_str(s: &str) -> Option<i64> {
    let value: f64 = s.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(cents_from_decimal(value))
}

/// Convert a decimal amount to cents, rounding half away from zero.
pub fn cents_from_decimal(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Render cents as a 2-decimal string ("-12.05").
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

// ---------------------------------------------------------------------------
// Input rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Revenue,
    Expense,
}

impl InvoiceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "revenue" => Some(Self::Revenue),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(Self::In),
            "out" => Some(Self::Out),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// One accounts-receivable invoice row.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceRecord {
    pub id: String,
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub entity: String,
    pub kind: InvoiceKind,
    pub invoice_no: Option<String>,
    pub match_id: Option<String>,
    pub status: Option<MatchStatus>,
}

impl InvoiceRecord {
    /// Still in the candidate pool: a revenue invoice never claimed by a match.
    pub fn is_open(&self) -> bool {
        self.kind == InvoiceKind::Revenue && self.match_id.is_none()
    }
}

/// One bank statement row.
#[derive(Debug, Clone, Serialize)]
pub struct BankRecord {
    pub id: String,
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub entity: String,
    pub direction: Direction,
    pub partner: Option<String>,
    pub memo: Option<String>,
    pub match_id: Option<String>,
    pub status: Option<MatchStatus>,
}

impl BankRecord {
    pub fn is_open(&self) -> bool {
        self.direction == Direction::In && self.match_id.is_none()
    }

    /// Free text used for processor-name filtering: partner, falling back to memo.
    pub fn narrative(&self) -> Option<&str> {
        self.partner
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.memo.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Match identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact,
    Fee,
    Batch,
}

impl MatchRule {
    /// Audit tag recorded on events.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Exact => "R1 exact",
            Self::Fee => "R2 fee",
            Self::Batch => "R3 batch",
        }
    }

    /// Status written to the bank side when this rule commits.
    pub fn bank_status(self) -> MatchStatus {
        match self {
            Self::Exact => MatchStatus::Matched,
            Self::Fee => MatchStatus::MatchedFee,
            Self::Batch => MatchStatus::MatchedBatch,
        }
    }
}

impl Serialize for MatchRule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStatus {
    #[serde(rename = "Matched")]
    Matched,
    #[serde(rename = "Matched (fee)")]
    MatchedFee,
    #[serde(rename = "Matched (batch)")]
    MatchedBatch,
}

impl MatchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Matched => "Matched",
            Self::MatchedFee => "Matched (fee)",
            Self::MatchedBatch => "Matched (batch)",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "Matched" => Some(Self::Matched),
            "Matched (fee)" => Some(Self::MatchedFee),
            "Matched (batch)" => Some(Self::MatchedBatch),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Structured match identifier: rule plus ordered participants.
///
/// The engine only ever works with this struct; the string form exists for
/// row columns, audit logs and display, and is never parsed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchKey {
    pub rule: MatchRule,
    pub invoice_ids: Vec<String>,
    pub bank_id: String,
}

impl MatchKey {
    pub fn exact(invoice_id: impl Into<String>, bank_id: impl Into<String>) -> Self {
        Self {
            rule: MatchRule::Exact,
            invoice_ids: vec![invoice_id.into()],
            bank_id: bank_id.into(),
        }
    }

    pub fn fee(invoice_id: impl Into<String>, bank_id: impl Into<String>) -> Self {
        Self {
            rule: MatchRule::Fee,
            invoice_ids: vec![invoice_id.into()],
            bank_id: bank_id.into(),
        }
    }

    pub fn batch(bank_id: impl Into<String>, invoice_ids: Vec<String>) -> Self {
        Self {
            rule: MatchRule::Batch,
            invoice_ids,
            bank_id: bank_id.into(),
        }
    }

    /// Rendered form written to row columns: `M<inv>-<bank>`, `F<inv>-<bank>`,
    /// `B<bank>-<inv,inv,...>`.
    pub fn render(&self) -> String {
        match self.rule {
            MatchRule::Exact => format!("M{}-{}", self.invoice_ids[0], self.bank_id),
            MatchRule::Fee => format!("F{}-{}", self.invoice_ids[0], self.bank_id),
            MatchRule::Batch => format!("B{}-{}", self.bank_id, self.invoice_ids.join(",")),
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// ---------------------------------------------------------------------------
// Audit + Output
// ---------------------------------------------------------------------------

/// One committed match, in discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct MatchEvent {
    pub rule: MatchRule,
    pub invoice_ids: Vec<String>,
    pub bank_id: String,
    pub match_id: String,
    pub fee_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    pub rule1_count: usize,
    pub rule2_count: usize,
    pub rule3_count: usize,
    pub events: Vec<MatchEvent>,
}

impl ReconSummary {
    pub fn empty() -> Self {
        Self {
            rule1_count: 0,
            rule2_count: 0,
            rule3_count: 0,
            events: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.rule1_count + self.rule2_count + self.rule3_count
    }
}

/// Mutated snapshots plus the audit summary.
#[derive(Debug, Clone, Serialize)]
pub struct ReconOutput {
    pub invoices: Vec<InvoiceRecord>,
    pub bank: Vec<BankRecord>,
    pub summary: ReconSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_round_away_float_noise() {
        assert_eq!(amount_cents_from_str("100.00"), Some(10_000));
        assert_eq!(amount_cents_from_str("96.5"), Some(9_650));
        // 0.1 + 0.2 style noise
        assert_eq!(cents_from_decimal(0.30000000000000004), 30);
        // half a cent, exactly representable: rounds away from zero
        assert_eq!(cents_from_decimal(0.125), 13);
        assert_eq!(cents_from_decimal(-0.125), -13);
        assert_eq!(amount_cents_from_str("abc"), None);
    }

    #[test]
    fn cents_format() {
        assert_eq!(format_cents(10_000), "100.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-1205), "-12.05");
    }

    #[test]
    fn match_key_render() {
        assert_eq!(MatchKey::exact("inv_1", "tx_9").render(), "Minv_1-tx_9");
        assert_eq!(MatchKey::fee("inv_1", "tx_9").render(), "Finv_1-tx_9");
        assert_eq!(
            MatchKey::batch("tx_9", vec!["inv_1".into(), "inv_2".into()]).render(),
            "Btx_9-inv_1,inv_2"
        );
    }

    #[test]
    fn status_labels_round_trip() {
        for status in [
            MatchStatus::Matched,
            MatchStatus::MatchedFee,
            MatchStatus::MatchedBatch,
        ] {
            assert_eq!(MatchStatus::from_label(status.label()), Some(status));
        }
        assert_eq!(MatchStatus::from_label("Open"), None);
    }

    #[test]
    fn event_serializes_rule_tag() {
        let event = MatchEvent {
            rule: MatchRule::Fee,
            invoice_ids: vec!["inv_1".into()],
            bank_id: "tx_9".into(),
            match_id: "Finv_1-tx_9".into(),
            fee_cents: 400,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["rule"], "R2 fee");
        assert_eq!(json["fee_cents"], 400);
    }
}
