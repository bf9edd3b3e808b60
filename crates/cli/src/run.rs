//! `llink run` / `llink validate` — config-driven reconciliation runs.

use std::path::{Path, PathBuf};

use ledgerlink_recon::csvio::{bank_to_csv, invoices_to_csv, load_bank, load_invoices};
use ledgerlink_recon::{reconcile, ReconConfig, ReconOutput};

use crate::exit_codes::{EXIT_INVALID_CONFIG, EXIT_OPEN_ITEMS, EXIT_RUNTIME};
use crate::CliError;

fn invalid_config(msg: impl Into<String>) -> CliError {
    CliError { code: EXIT_INVALID_CONFIG, message: msg.into(), hint: None }
}

fn runtime(msg: impl Into<String>) -> CliError {
    CliError { code: EXIT_RUNTIME, message: msg.into(), hint: None }
}

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    write_back: bool,
    fail_on_open: bool,
) -> Result<(), CliError> {
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| runtime(format!("cannot read config: {e}")))?;
    let config = ReconConfig::from_toml(&config_str).map_err(|e| invalid_config(e.to_string()))?;

    // Input/output paths resolve relative to the config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let invoices_path = base_dir.join(&config.inputs.invoices);
    let invoices_data = std::fs::read_to_string(&invoices_path)
        .map_err(|e| runtime(format!("cannot read {}: {e}", invoices_path.display())))?;
    let invoices = load_invoices(&config.inputs.invoices, &invoices_data)
        .map_err(|e| runtime(e.to_string()))?;

    let bank_path = base_dir.join(&config.inputs.bank);
    let bank_data = std::fs::read_to_string(&bank_path)
        .map_err(|e| runtime(format!("cannot read {}: {e}", bank_path.display())))?;
    let bank = load_bank(&config.inputs.bank, &bank_data).map_err(|e| runtime(e.to_string()))?;

    tracing::debug!(invoices = invoices.len(), bank = bank.len(), "snapshots loaded");

    let result = reconcile(&invoices, &bank, &config.matching).map_err(|e| runtime(e.to_string()))?;

    // Machine output
    let json_dest = output_file.or_else(|| config.output.json.as_ref().map(|p| base_dir.join(p)));
    if json_output || json_dest.is_some() {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| runtime(format!("JSON serialization error: {e}")))?;
        if let Some(ref path) = json_dest {
            std::fs::write(path, &json_str)
                .map_err(|e| runtime(format!("cannot write output: {e}")))?;
            eprintln!("wrote {}", path.display());
        }
        if json_output {
            println!("{json_str}");
        }
    }

    // Snapshot write-back: configured [output] paths, else over the inputs
    if write_back || config.matching.persist {
        let invoices_dest = config
            .output
            .invoices
            .as_ref()
            .map(|p| base_dir.join(p))
            .unwrap_or(invoices_path);
        let bank_dest = config
            .output
            .bank
            .as_ref()
            .map(|p| base_dir.join(p))
            .unwrap_or(bank_path);

        let rendered = invoices_to_csv(&result.invoices).map_err(|e| runtime(e.to_string()))?;
        std::fs::write(&invoices_dest, rendered)
            .map_err(|e| runtime(format!("cannot write {}: {e}", invoices_dest.display())))?;
        let rendered = bank_to_csv(&result.bank).map_err(|e| runtime(e.to_string()))?;
        std::fs::write(&bank_dest, rendered)
            .map_err(|e| runtime(format!("cannot write {}: {e}", bank_dest.display())))?;
        eprintln!("wrote {} and {}", invoices_dest.display(), bank_dest.display());
    }

    let (open_invoices, open_bank) = open_counts(&result);
    let s = &result.summary;
    eprintln!(
        "recon '{}': {} match(es) — {} exact, {} fee, {} batch; {} invoice(s) and {} bank row(s) still open",
        config.name,
        s.total(),
        s.rule1_count,
        s.rule2_count,
        s.rule3_count,
        open_invoices,
        open_bank,
    );

    if fail_on_open && (open_invoices > 0 || open_bank > 0) {
        return Err(CliError {
            code: EXIT_OPEN_ITEMS,
            message: format!("{} open item(s) remain", open_invoices + open_bank),
            hint: None,
        }
        .with_hint("review unmatched rows or adjust [matching] tolerances"));
    }

    Ok(())
}

fn open_counts(result: &ReconOutput) -> (usize, usize) {
    let invoices = result.invoices.iter().filter(|r| r.is_open()).count();
    let bank = result.bank.iter().filter(|r| r.is_open()).count();
    (invoices, bank)
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config_str = std::fs::read_to_string(&config_path)
        .map_err(|e| runtime(format!("cannot read config: {e}")))?;

    match ReconConfig::from_toml(&config_str) {
        Ok(config) => {
            eprintln!(
                "valid: '{}' — invoices {}, bank {}, window ±{}d, tolerance {}",
                config.name,
                config.inputs.invoices,
                config.inputs.bank,
                config.matching.date_window_days,
                config.matching.amount_tolerance,
            );
            Ok(())
        }
        Err(e) => Err(invalid_config(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
name = "Close"

[inputs]
invoices = "invoices.csv"
bank = "bank.csv"

[matching]
only_psp_names = false
"#;

    const INVOICES: &str = "\
id,date,amount,entity,kind
inv_1,2031-03-10,100.00,alpha,revenue
inv_2,2031-03-12,55.00,alpha,revenue
";

    const BANK: &str = "\
id,date,amount,entity,direction
tx_1,2031-03-11,100.00,alpha,in
";

    fn write_workspace(dir: &Path) -> PathBuf {
        std::fs::write(dir.join("invoices.csv"), INVOICES).unwrap();
        std::fs::write(dir.join("bank.csv"), BANK).unwrap();
        let config_path = dir.join("close.toml");
        std::fs::write(&config_path, CONFIG).unwrap();
        config_path
    }

    #[test]
    fn run_writes_back_matched_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_workspace(dir.path());

        cmd_run(config_path, false, None, true, false).unwrap();

        let written = std::fs::read_to_string(dir.path().join("invoices.csv")).unwrap();
        assert!(written.contains("Minv_1-tx_1"));
        assert!(written.contains("Matched"));
        let written = std::fs::read_to_string(dir.path().join("bank.csv")).unwrap();
        assert!(written.contains("Minv_1-tx_1"));
    }

    #[test]
    fn run_without_write_leaves_inputs_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_workspace(dir.path());

        cmd_run(config_path, false, None, false, false).unwrap();

        let untouched = std::fs::read_to_string(dir.path().join("invoices.csv")).unwrap();
        assert_eq!(untouched, INVOICES);
    }

    #[test]
    fn run_emits_json_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_workspace(dir.path());
        let out_path = dir.path().join("result.json");

        cmd_run(config_path, false, Some(out_path.clone()), false, false).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out_path).unwrap()).unwrap();
        assert_eq!(json["summary"]["rule1_count"], 1);
        assert_eq!(json["summary"]["events"][0]["rule"], "R1 exact");
    }

    #[test]
    fn fail_on_open_signals_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_workspace(dir.path());

        // inv_2 has no counterpart, so open items remain
        let err = cmd_run(config_path, false, None, false, true).unwrap_err();
        assert_eq!(err.code, EXIT_OPEN_ITEMS);
    }

    #[test]
    fn bad_config_maps_to_invalid_config_exit() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("close.toml");
        std::fs::write(&config_path, "name = \"broken\"").unwrap();

        let err = cmd_run(config_path.clone(), false, None, false, false).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_CONFIG);

        let err = cmd_validate(config_path).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_CONFIG);
    }

    #[test]
    fn missing_input_maps_to_runtime_exit() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("close.toml");
        std::fs::write(&config_path, CONFIG).unwrap();

        let err = cmd_run(config_path, false, None, false, false).unwrap_err();
        assert_eq!(err.code, EXIT_RUNTIME);
    }

    #[test]
    fn validate_accepts_good_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_workspace(dir.path());
        cmd_validate(config_path).unwrap();
    }
}
