// 🗂️ Catalog & Transaction Tables - string-typed records + BOM-aware CSV I/O
//
// Every column is carried as a string. Core fields are lifted into typed
// struct fields; the full original row is kept in `fields` so audit logs can
// dump it verbatim and untouched columns pass through to the outputs.

use crate::config::{ItemColumns, TransactionColumns};
use crate::error::Result;
use crate::schema::require_columns;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// ============================================================================
// ITEM RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Line in the source file (header is line 1)
    pub line_number: u64,

    /// Raw barcode; not unique before consolidation
    pub barcode: String,

    pub en_short_desc: Option<String>,
    pub en_full_desc: Option<String>,

    /// Arabic fields are never rewritten, only used as the secondary grouping key
    pub ar_short_desc: Option<String>,
    pub ar_full_desc: Option<String>,

    pub category_levels: Vec<Option<String>>,

    /// Grouping key, filled by the normalizer. `None` means "no group".
    #[serde(default)]
    pub normalized_desc: Option<String>,

    /// Every column as read, in header order
    pub fields: Vec<String>,
}

impl ItemRecord {
    /// Build a record laid out in the default column order
    pub fn new(
        barcode: &str,
        en_short_desc: Option<&str>,
        en_full_desc: Option<&str>,
        ar_short_desc: Option<&str>,
    ) -> Self {
        let mut record = ItemRecord {
            line_number: 0,
            barcode: barcode.to_string(),
            en_short_desc: en_short_desc.map(str::to_string),
            en_full_desc: en_full_desc.map(str::to_string),
            ar_short_desc: ar_short_desc.map(str::to_string),
            ar_full_desc: None,
            category_levels: vec![None; 4],
            normalized_desc: None,
            fields: Vec::new(),
        };
        record.fields = record.default_fields();
        record
    }

    /// Builder pattern: attach a pre-computed grouping key
    pub fn with_normalized_desc(mut self, normalized: &str) -> Self {
        self.normalized_desc = Some(normalized.to_string());
        self
    }

    /// Builder pattern: set the source line
    pub fn with_line_number(mut self, line_number: u64) -> Self {
        self.line_number = line_number;
        self
    }

    fn default_fields(&self) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let mut fields = vec![
            self.barcode.clone(),
            opt(&self.en_short_desc),
            opt(&self.en_full_desc),
            opt(&self.ar_short_desc),
            opt(&self.ar_full_desc),
        ];
        fields.extend(self.category_levels.iter().map(opt));
        fields
    }
}

// ============================================================================
// CATALOG
// ============================================================================

/// Item table snapshot: headers plus records in file order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub headers: Vec<String>,
    pub barcode_col: usize,
    pub items: Vec<ItemRecord>,
}

impl Catalog {
    /// Catalog with the default column layout (used when records are built in code)
    pub fn new(items: Vec<ItemRecord>) -> Self {
        let columns = ItemColumns::default();
        Catalog {
            headers: columns.required().into_iter().map(str::to_string).collect(),
            barcode_col: 0,
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn from_path(path: &Path, columns: &ItemColumns) -> Result<Self> {
        Self::from_reader(open_bom_aware(path)?, columns)
    }

    /// Read an item table; fails before reading any row if a required column is missing
    pub fn from_reader<R: Read>(reader: R, columns: &ItemColumns) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let idx = require_columns("item", &headers, &columns.required())?;
        let barcode_col = idx[0];
        let (en_short, en_full, ar_short, ar_full) = (idx[1], idx[2], idx[3], idx[4]);
        let category_cols = &idx[5..];

        let mut items = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let line_number = record.position().map(|p| p.line()).unwrap_or_default();
            items.push(ItemRecord {
                line_number,
                barcode: record.get(barcode_col).unwrap_or_default().to_string(),
                en_short_desc: cell(&record, en_short),
                en_full_desc: cell(&record, en_full),
                ar_short_desc: cell(&record, ar_short),
                ar_full_desc: cell(&record, ar_full),
                category_levels: category_cols.iter().map(|&c| cell(&record, c)).collect(),
                normalized_desc: None,
                fields: record.iter().map(str::to_string).collect(),
            });
        }

        Ok(Catalog {
            headers,
            barcode_col,
            items,
        })
    }

    /// Row as it should be written: original fields with the current barcode
    pub fn output_row(&self, item: &ItemRecord) -> Vec<String> {
        let mut row = item.fields.clone();
        if let Some(cell) = row.get_mut(self.barcode_col) {
            *cell = item.barcode.clone();
        }
        row
    }

    /// SHA-256 over every row, identifying this snapshot
    pub fn snapshot_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.headers.join("\u{1f}"));
        for item in &self.items {
            hasher.update("\u{1e}");
            hasher.update(item.fields.join("\u{1f}"));
        }
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// TRANSACTION RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub line_number: u64,

    /// Item reference; the only field this engine ever rewrites
    pub item_barcode: String,

    pub customer_barcode: String,
    pub invoice_id: String,
    pub quantity: String,
    pub unit_price: String,
    pub timestamp: String,

    /// Every column as read, in header order
    pub fields: Vec<String>,
}

impl TransactionRecord {
    /// Build a record laid out in the default column order
    pub fn new(item_barcode: &str, customer_barcode: &str, invoice_id: &str) -> Self {
        let mut tx = TransactionRecord {
            line_number: 0,
            item_barcode: item_barcode.to_string(),
            customer_barcode: customer_barcode.to_string(),
            invoice_id: invoice_id.to_string(),
            quantity: "1".to_string(),
            unit_price: "0".to_string(),
            timestamp: String::new(),
            fields: Vec::new(),
        };
        tx.fields = vec![
            tx.item_barcode.clone(),
            tx.customer_barcode.clone(),
            tx.invoice_id.clone(),
            tx.quantity.clone(),
            tx.unit_price.clone(),
            tx.timestamp.clone(),
        ];
        tx
    }

    pub fn with_line_number(mut self, line_number: u64) -> Self {
        self.line_number = line_number;
        self
    }
}

/// Transaction table: headers plus records in file order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLog {
    pub headers: Vec<String>,
    pub item_col: usize,
    pub transactions: Vec<TransactionRecord>,
}

impl TransactionLog {
    pub fn new(transactions: Vec<TransactionRecord>) -> Self {
        let columns = TransactionColumns::default();
        TransactionLog {
            headers: columns.required().into_iter().map(str::to_string).collect(),
            item_col: 0,
            transactions,
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn from_path(path: &Path, columns: &TransactionColumns) -> Result<Self> {
        Self::from_reader(open_bom_aware(path)?, columns)
    }

    pub fn from_reader<R: Read>(reader: R, columns: &TransactionColumns) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let idx = require_columns("transaction", &headers, &columns.required())?;
        let get = |record: &csv::StringRecord, i: usize| record.get(idx[i]).unwrap_or_default().to_string();

        let mut transactions = Vec::new();
        for result in rdr.records() {
            let record = result?;
            transactions.push(TransactionRecord {
                line_number: record.position().map(|p| p.line()).unwrap_or_default(),
                item_barcode: get(&record, 0),
                customer_barcode: get(&record, 1),
                invoice_id: get(&record, 2),
                quantity: get(&record, 3),
                unit_price: get(&record, 4),
                timestamp: get(&record, 5),
                fields: record.iter().map(str::to_string).collect(),
            });
        }

        Ok(TransactionLog {
            headers,
            item_col: idx[0],
            transactions,
        })
    }

    /// Row as it should be written: original fields with the current item reference
    pub fn output_row(&self, tx: &TransactionRecord) -> Vec<String> {
        let mut row = tx.fields.clone();
        if let Some(cell) = row.get_mut(self.item_col) {
            *cell = tx.item_barcode.clone();
        }
        row
    }

    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let rows = self.transactions.iter().map(|tx| self.output_row(tx));
        write_table(create_bom_file(path)?, &self.headers, rows)
    }
}

// ============================================================================
// CSV HELPERS
// ============================================================================

/// Blank cells are treated as missing
fn cell(record: &csv::StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Open a file for reading, skipping a leading UTF-8 BOM if present
pub fn open_bom_aware(path: &Path) -> Result<BufReader<File>> {
    let mut reader = BufReader::new(File::open(path)?);
    if reader.fill_buf()?.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }
    Ok(reader)
}

/// Create a file and write the UTF-8 BOM so spreadsheet tools pick the right encoding
pub fn create_bom_file(path: &Path) -> Result<File> {
    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;
    Ok(file)
}

/// Write a table with every field quoted; all cells are strings
pub fn write_table<W, I>(writer: W, headers: &[String], rows: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(writer);

    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
