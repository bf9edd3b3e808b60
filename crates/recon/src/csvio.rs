//! CSV boundary: fixed-schema loaders and writers for the two tables.
//!
//! Loaders are string-based so the engine crate stays free of filesystem
//! concerns. Optional columns missing from the input are backfilled as unset,
//! mirroring what the calling layer is expected to guarantee.

use chrono::NaiveDate;

use crate::error::ReconError;
use crate::model::{
    amount_cents_from_str, format_cents, BankRecord, Direction, InvoiceKind, InvoiceRecord,
    MatchStatus,
};

const INVOICE_HEADER: [&str; 8] = [
    "id", "date", "amount", "entity", "kind", "invoice_no", "match_id", "status",
];
const BANK_HEADER: [&str; 9] = [
    "id", "date", "amount", "entity", "direction", "partner", "memo", "match_id", "status",
];

struct Columns {
    headers: Vec<String>,
    file: String,
}

impl Columns {
    fn read(file: &str, reader: &mut csv::Reader<&[u8]>) -> Result<Self, ReconError> {
        let headers = reader
            .headers()
            .map_err(|e| ReconError::Io(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        Ok(Self { headers, file: file.to_string() })
    }

    fn required(&self, name: &str) -> Result<usize, ReconError> {
        self.headers.iter().position(|h| h == name).ok_or_else(|| ReconError::MissingColumn {
            file: self.file.clone(),
            column: name.into(),
        })
    }

    fn optional(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

fn opt_field(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_date(file: &str, record_id: &str, value: &str) -> Result<NaiveDate, ReconError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ReconError::DateParse {
        file: file.into(),
        record_id: record_id.into(),
        value: value.into(),
    })
}

fn parse_status(
    file: &str,
    record_id: &str,
    value: Option<String>,
) -> Result<Option<MatchStatus>, ReconError> {
    match value {
        None => Ok(None),
        Some(label) => {
            MatchStatus::from_label(&label).map(Some).ok_or_else(|| ReconError::FieldParse {
                file: file.into(),
                record_id: record_id.into(),
                column: "status".into(),
                value: label,
            })
        }
    }
}

/// Load the invoice table: `id,date,amount,entity,kind[,invoice_no,match_id,status]`.
pub fn load_invoices(file: &str, csv_data: &str) -> Result<Vec<InvoiceRecord>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());
    let columns = Columns::read(file, &mut reader)?;

    let id_idx = columns.required("id")?;
    let date_idx = columns.required("date")?;
    let amount_idx = columns.required("amount")?;
    let entity_idx = columns.required("entity")?;
    let kind_idx = columns.required("kind")?;
    let invoice_no_idx = columns.optional("invoice_no");
    let match_id_idx = columns.optional("match_id");
    let status_idx = columns.optional("status");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
        let id = record.get(id_idx).unwrap_or("").trim().to_string();

        let date_str = record.get(date_idx).unwrap_or("").trim();
        let date = parse_date(file, &id, date_str)?;

        let amount_str = record.get(amount_idx).unwrap_or("").trim();
        let amount_cents =
            amount_cents_from_str(amount_str).ok_or_else(|| ReconError::AmountParse {
                file: file.into(),
                record_id: id.clone(),
                value: amount_str.into(),
            })?;

        let kind_str = record.get(kind_idx).unwrap_or("").trim();
        let kind = InvoiceKind::parse(kind_str).ok_or_else(|| ReconError::FieldParse {
            file: file.into(),
            record_id: id.clone(),
            column: "kind".into(),
            value: kind_str.into(),
        })?;

        let status = parse_status(file, &id, opt_field(&record, status_idx))?;

        rows.push(InvoiceRecord {
            entity: record.get(entity_idx).unwrap_or("").trim().to_string(),
            invoice_no: opt_field(&record, invoice_no_idx),
            match_id: opt_field(&record, match_id_idx),
            id,
            date,
            amount_cents,
            kind,
            status,
        });
    }

    Ok(rows)
}

/// Load the bank table: `id,date,amount,entity,direction[,partner,memo,match_id,status]`.
pub fn load_bank(file: &str, csv_data: &str) -> Result<Vec<BankRecord>, ReconError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());
    let columns = Columns::read(file, &mut reader)?;

    let id_idx = columns.required("id")?;
    let date_idx = columns.required("date")?;
    let amount_idx = columns.required("amount")?;
    let entity_idx = columns.required("entity")?;
    let direction_idx = columns.required("direction")?;
    let partner_idx = columns.optional("partner");
    let memo_idx = columns.optional("memo");
    let match_id_idx = columns.optional("match_id");
    let status_idx = columns.optional("status");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
        let id = record.get(id_idx).unwrap_or("").trim().to_string();

        let date_str = record.get(date_idx).unwrap_or("").trim();
        let date = parse_date(file, &id, date_str)?;

        let amount_str = record.get(amount_idx).unwrap_or("").trim();
        let amount_cents =
            amount_cents_from_str(amount_str).ok_or_else(|| ReconError::AmountParse {
                file: file.into(),
                record_id: id.clone(),
                value: amount_str.into(),
            })?;

        let direction_str = record.get(direction_idx).unwrap_or("").trim();
        let direction = Direction::parse(direction_str).ok_or_else(|| ReconError::FieldParse {
            file: file.into(),
            record_id: id.clone(),
            column: "direction".into(),
            value: direction_str.into(),
        })?;

        let status = parse_status(file, &id, opt_field(&record, status_idx))?;

        rows.push(BankRecord {
            entity: record.get(entity_idx).unwrap_or("").trim().to_string(),
            partner: opt_field(&record, partner_idx),
            memo: opt_field(&record, memo_idx),
            match_id: opt_field(&record, match_id_idx),
            id,
            date,
            amount_cents,
            direction,
            status,
        });
    }

    Ok(rows)
}

/// Render the invoice table back to CSV, full schema.
pub fn invoices_to_csv(rows: &[InvoiceRecord]) -> Result<String, ReconError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(INVOICE_HEADER)
        .map_err(|e| ReconError::Io(e.to_string()))?;
    for row in rows {
        let date = row.date.to_string();
        let amount = format_cents(row.amount_cents);
        writer
            .write_record([
                row.id.as_str(),
                date.as_str(),
                amount.as_str(),
                row.entity.as_str(),
                row.kind.as_str(),
                row.invoice_no.as_deref().unwrap_or(""),
                row.match_id.as_deref().unwrap_or(""),
                row.status.map(|s| s.label()).unwrap_or(""),
            ])
            .map_err(|e| ReconError::Io(e.to_string()))?;
    }
    finish(writer)
}

/// Render the bank table back to CSV, full schema.
pub fn bank_to_csv(rows: &[BankRecord]) -> Result<String, ReconError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(BANK_HEADER)
        .map_err(|e| ReconError::Io(e.to_string()))?;
    for row in rows {
        let date = row.date.to_string();
        let amount = format_cents(row.amount_cents);
        writer
            .write_record([
                row.id.as_str(),
                date.as_str(),
                amount.as_str(),
                row.entity.as_str(),
                row.direction.as_str(),
                row.partner.as_deref().unwrap_or(""),
                row.memo.as_deref().unwrap_or(""),
                row.match_id.as_deref().unwrap_or(""),
                row.status.map(|s| s.label()).unwrap_or(""),
            ])
            .map_err(|e| ReconError::Io(e.to_string()))?;
    }
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ReconError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ReconError::Io(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReconError::Io(e.to_string()))
}
