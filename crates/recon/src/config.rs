use serde::Deserialize;

use crate::error::ReconError;
use crate::model::cents_from_decimal;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub inputs: InputsConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputsConfig {
    /// Invoice CSV, resolved relative to the config file.
    pub invoices: String,
    /// Bank transaction CSV, resolved relative to the config file.
    pub bank: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub invoices: Option<String>,
    #[serde(default)]
    pub bank: Option<String>,
}

// ---------------------------------------------------------------------------
// Matching knobs (the engine's configuration)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Max absolute day gap between invoice and bank dates.
    #[serde(default = "default_date_window_days")]
    pub date_window_days: i64,
    /// Slack for exact-match amount comparison, in currency units.
    #[serde(default = "default_amount_tolerance")]
    pub amount_tolerance: f64,
    /// Max absolute processor fee accepted, in currency units.
    #[serde(default = "default_psp_fee_abs")]
    pub psp_fee_abs: f64,
    /// Max fee as a fraction of gross, in [0, 1].
    #[serde(default = "default_psp_fee_pct")]
    pub psp_fee_pct: f64,
    /// Restrict fee-rule candidates to rows whose narrative names a known PSP.
    #[serde(default = "default_only_psp_names")]
    pub only_psp_names: bool,
    /// Caller-level flag: write mutated snapshots back. Not read by the engine.
    #[serde(default)]
    pub persist: bool,
}

fn default_date_window_days() -> i64 {
    3
}

fn default_amount_tolerance() -> f64 {
    0.50
}

fn default_psp_fee_abs() -> f64 {
    50.0
}

fn default_psp_fee_pct() -> f64 {
    0.04
}

fn default_only_psp_names() -> bool {
    true
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            date_window_days: default_date_window_days(),
            amount_tolerance: default_amount_tolerance(),
            psp_fee_abs: default_psp_fee_abs(),
            psp_fee_pct: default_psp_fee_pct(),
            only_psp_names: default_only_psp_names(),
            persist: false,
        }
    }
}

impl MatchingConfig {
    pub fn validate(&self) -> Result<(), ReconError> {
        if self.date_window_days < 0 {
            return Err(ReconError::ConfigValidation(format!(
                "date_window_days must be >= 0, got {}",
                self.date_window_days
            )));
        }
        if !self.amount_tolerance.is_finite() || self.amount_tolerance < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "amount_tolerance must be >= 0, got {}",
                self.amount_tolerance
            )));
        }
        if !self.psp_fee_abs.is_finite() || self.psp_fee_abs < 0.0 {
            return Err(ReconError::ConfigValidation(format!(
                "psp_fee_abs must be >= 0, got {}",
                self.psp_fee_abs
            )));
        }
        if !self.psp_fee_pct.is_finite() || !(0.0..=1.0).contains(&self.psp_fee_pct) {
            return Err(ReconError::ConfigValidation(format!(
                "psp_fee_pct must be within [0, 1], got {}",
                self.psp_fee_pct
            )));
        }
        Ok(())
    }

    pub fn amount_tolerance_cents(&self) -> i64 {
        cents_from_decimal(self.amount_tolerance)
    }

    pub fn psp_fee_abs_cents(&self) -> i64 {
        cents_from_decimal(self.psp_fee_abs)
    }
}

// ---------------------------------------------------------------------------
// PSP narrative filter
// ---------------------------------------------------------------------------

/// Known payment-processor name fragments matched against bank narratives.
pub const PSP_NAME_FRAGMENTS: &[&str] = &[
    "stripe",
    "adyen",
    "mollie",
    "paypal",
    "checkout.com",
    "braintree",
];

/// Case-insensitive test: does the narrative name a known processor?
pub fn is_psp_narrative(text: &str) -> bool {
    let lower = text.to_lowercase();
    PSP_NAME_FRAGMENTS.iter().any(|frag| lower.contains(frag))
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.inputs.invoices.is_empty() {
            return Err(ReconError::ConfigValidation(
                "inputs.invoices must not be empty".into(),
            ));
        }
        if self.inputs.bank.is_empty() {
            return Err(ReconError::ConfigValidation(
                "inputs.bank must not be empty".into(),
            ));
        }
        self.matching.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
