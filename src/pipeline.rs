// 🚚 Canonicalization Pipeline - Normalizer → Resolver → Map → {Remap, Consolidate} → Verify
//
// Stages hand each other in-memory snapshots. Files are written only at two
// checkpoints: after consolidation and after remap. The canonical map is
// built once per run and only ever borrowed afterwards.

use crate::audit::{write_quarantine_to_path, write_removed_items_to_path};
use crate::canonical_map::CanonicalMap;
use crate::catalog::{Catalog, TransactionLog};
use crate::config::PipelineConfig;
use crate::consolidator::{annotate, write_annotated, AnnotatedItem, Consolidation, ItemConsolidator};
use crate::error::{CanonError, Result};
use crate::ledger::{Event, RunLedger};
use crate::normalizer::DescriptionNormalizer;
use crate::remapper::{RemapOutcome, TransactionRemapper};
use crate::resolver::{DuplicateGroupResolver, Resolution};
use crate::schema::{inspect_catalog, SchemaFinding};
use crate::verifier::{IntegrityReport, IntegrityVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// RUN SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Complete,
    NeedsAttention,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub snapshot_digest: String,

    pub items_original: usize,
    pub items_consolidated: usize,
    pub items_removed: usize,

    pub transactions: usize,
    pub transactions_affected: usize,
    pub transactions_quarantined: usize,
    pub quarantined_refs: Vec<String>,

    pub unresolved_refs: usize,
    pub unreferenced_items: usize,
    pub map_conflicts: usize,
    pub schema_findings: usize,

    pub verdict: Verdict,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.verdict == Verdict::Complete
    }

    /// Human summary block for the console
    pub fn render(&self) -> String {
        let verdict = match self.verdict {
            Verdict::Complete => "✅ COMPLETE",
            Verdict::NeedsAttention => "⚠️  NEEDS ATTENTION",
        };
        format!(
            "Run {}\n\
             ✓ Items: {} → {} ({} removed)\n\
             ✓ Transactions: {} ({} remapped, {} quarantined)\n\
             ✓ Unresolved references: {}\n\
             ✓ Unreferenced items: {}\n\
             {}",
            self.run_id,
            self.items_original,
            self.items_consolidated,
            self.items_removed,
            self.transactions,
            self.transactions_affected,
            self.transactions_quarantined,
            self.unresolved_refs,
            self.unreferenced_items,
            verdict
        )
    }
}

// ============================================================================
// PIPELINE RUN
// ============================================================================

/// Everything one run produced, still in memory
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub summary: RunSummary,
    pub findings: Vec<SchemaFinding>,
    pub resolution: Resolution,
    pub map: CanonicalMap,
    pub annotated: Vec<AnnotatedItem>,
    pub consolidation: Consolidation,
    pub remap: RemapOutcome,
    pub report: IntegrityReport,
}

pub struct Pipeline {
    config: PipelineConfig,
    normalizer: DescriptionNormalizer,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let normalizer = DescriptionNormalizer::from_settings(&config.normalizer)?;
        Ok(Pipeline { config, normalizer })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &DescriptionNormalizer {
        &self.normalizer
    }

    /// Run every stage in memory
    pub fn run(&self, catalog: Catalog, transactions: TransactionLog) -> PipelineRun {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(%run_id, items = catalog.len(), transactions = transactions.len(), "run started");

        let findings = inspect_catalog(&catalog);

        let catalog = self.normalizer.normalize_catalog(catalog);
        let resolution = DuplicateGroupResolver::new().resolve(&catalog);
        let map = CanonicalMap::build(&catalog, &resolution);

        let annotated = annotate(&catalog, &resolution, &map);
        let consolidation = ItemConsolidator::new().consolidate(&catalog, annotated.clone());
        let remap = TransactionRemapper::new(&map).remap(transactions);

        let report = IntegrityVerifier::new().verify(&remap.log, &consolidation.catalog);

        let verdict = if report.is_clean() && remap.is_fully_resolved() {
            Verdict::Complete
        } else {
            Verdict::NeedsAttention
        };

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            snapshot_digest: map.snapshot_digest().to_string(),
            items_original: catalog.len(),
            items_consolidated: consolidation.catalog.len(),
            items_removed: consolidation.removed.len(),
            transactions: remap.log.len(),
            transactions_affected: remap.affected,
            transactions_quarantined: remap.quarantine.len(),
            quarantined_refs: remap.quarantined_refs(),
            unresolved_refs: report.result.missing_count(),
            unreferenced_items: report.unreferenced_items.len(),
            map_conflicts: map.conflicts().len(),
            schema_findings: findings.len(),
            verdict,
        };

        info!(run_id = %summary.run_id, verdict = ?summary.verdict, "run finished");

        PipelineRun {
            summary,
            findings,
            resolution,
            map,
            annotated,
            consolidation,
            remap,
            report,
        }
    }

    /// Load both tables, run, write checkpoints, then clean up if integrity holds
    pub fn run_files(
        &self,
        items_path: &Path,
        transactions_path: &Path,
        out_dir: &Path,
        ledger: Option<&mut RunLedger>,
    ) -> Result<PipelineRun> {
        // Both tables are validated before any stage runs
        let catalog = Catalog::from_path(items_path, &self.config.item_columns)?;
        let transactions = TransactionLog::from_path(transactions_path, &self.config.transaction_columns)?;

        let run = self.run(catalog, transactions);
        let checkpoints = Checkpoints::new(out_dir, &self.config);
        checkpoints.write(&run)?;

        if run.report.may_discard_intermediates() && !self.config.keep_intermediates {
            let discarded = discard_intermediates(&run.report, &checkpoints.intermediates())?;
            info!(discarded, "intermediate artifacts removed");
        } else if !run.report.is_clean() {
            warn!(
                dir = %out_dir.display(),
                "integrity check failed; intermediate artifacts retained for inspection"
            );
        }

        if let Some(ledger) = ledger {
            let recorded = ledger.insert_events(&run_events(&run))?;
            info!(recorded, "ledger updated");
        }

        Ok(run)
    }
}

// ============================================================================
// CHECKPOINTS
// ============================================================================

/// Output file locations for one run
pub struct Checkpoints {
    pub annotated_catalog: PathBuf,
    pub consolidated_items: PathBuf,
    pub removed_items_log: PathBuf,
    pub remapped_transactions: PathBuf,
    pub quarantine_log: PathBuf,
    pub summary: PathBuf,
}

impl Checkpoints {
    pub fn new(out_dir: &Path, config: &PipelineConfig) -> Self {
        let files = &config.output;
        Checkpoints {
            annotated_catalog: out_dir.join(&files.annotated_catalog),
            consolidated_items: out_dir.join(&files.consolidated_items),
            removed_items_log: out_dir.join(&files.removed_items_log),
            remapped_transactions: out_dir.join(&files.remapped_transactions),
            quarantine_log: out_dir.join(&files.quarantine_log),
            summary: out_dir.join(&files.summary),
        }
    }

    /// Files only needed until integrity is confirmed
    pub fn intermediates(&self) -> Vec<PathBuf> {
        vec![self.annotated_catalog.clone()]
    }

    pub fn write(&self, run: &PipelineRun) -> Result<()> {
        if let Some(dir) = self.summary.parent() {
            fs::create_dir_all(dir)?;
        }

        // Checkpoint 1: end of consolidation
        // consolidated catalog shares the input's headers and barcode column
        let layout = &run.consolidation.catalog;
        write_annotated(&self.annotated_catalog, layout, &run.annotated)?;
        run.consolidation.write_to_path(&self.consolidated_items)?;
        write_removed_items_to_path(&self.removed_items_log, &layout.headers, &run.consolidation.removed)?;

        // Checkpoint 2: end of remap
        run.remap.log.write_to_path(&self.remapped_transactions)?;
        write_quarantine_to_path(&self.quarantine_log, &run.remap.log.headers, &run.remap.quarantine)?;

        fs::write(&self.summary, serde_json::to_string_pretty(&run.summary)?)?;
        Ok(())
    }
}

/// Delete intermediate files; refused unless the integrity report is clean
pub fn discard_intermediates(report: &IntegrityReport, paths: &[PathBuf]) -> Result<usize> {
    if !report.may_discard_intermediates() {
        return Err(CanonError::CleanupRefused {
            unresolved: report.result.missing_count(),
        });
    }

    let mut removed = 0;
    for path in paths {
        if path.exists() {
            fs::remove_file(path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Ledger events describing one run
pub fn run_events(run: &PipelineRun) -> Vec<Event> {
    let run_id = run.summary.run_id.as_str();
    let mut events = vec![Event::new(
        run_id,
        "run_started",
        "run",
        run_id,
        serde_json::json!({
            "snapshot_digest": run.summary.snapshot_digest,
            "items": run.summary.items_original,
            "transactions": run.summary.transactions,
        }),
    )];

    for removed in &run.consolidation.removed {
        events.push(Event::new(
            run_id,
            "item_removed",
            "item",
            &removed.record.barcode,
            serde_json::json!({
                "canonical": removed.canonical,
                "line_number": removed.record.line_number,
                "reason": removed.reason.describe(),
            }),
        ));
    }

    for quarantined in &run.remap.quarantine {
        events.push(Event::new(
            run_id,
            "transaction_quarantined",
            "transaction",
            &quarantined.record.invoice_id,
            serde_json::json!({
                "item_barcode": quarantined.record.item_barcode,
                "line_number": quarantined.record.line_number,
                "reason": quarantined.reason.describe(),
            }),
        ));
    }

    events.push(Event::new(
        run_id,
        "run_verified",
        "run",
        run_id,
        serde_json::json!({
            "clean": run.report.is_clean(),
            "verdict": run.summary.verdict,
            "unresolved": run.report.result.missing_count(),
        }),
    ));

    events
}

// ============================================================================
// TESTS
// ============================================================================
