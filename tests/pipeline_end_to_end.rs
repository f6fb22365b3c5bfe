// End-to-end runs over real CSV files in a temp directory

use catalog_canon::{
    CanonError, Catalog, Pipeline, PipelineConfig, RunLedger, TransactionLog, Verdict,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const ITEM_HEADER: &str = "BARCODE,EN_SHORT_DESC,EN_FULL_DESCRIPTION,AR_SHORT_DESC,AR_FULL_DESCRIPTION,CATEGORY_LEVEL1,CATEGORY_LEVEL2,CATEGORY_LEVEL3,CATEGORY_LEVEL4";
const TX_HEADER: &str = "item_barcode,customer_barcode,invoice_id,quantity,unit_price,timestamp";

fn create_test_items(dir: &Path) -> PathBuf {
    let path = dir.join("items.csv");
    let body = [
        ITEM_HEADER,
        "1001,Widget,Widget,,,Home,Tools,,",
        "1002,,widget,,,Home,Tools,,",
        "3001,Blue Mug,Blue Mug #MG7,كوب,,Kitchen,,,",
        "3002,Mug Blue,Mug Blue,كوب,,Kitchen,,,",
        "5001,Lone Lantern Large,,فانوس,,Outdoor,,,",
    ]
    .join("\n");
    // BOM like the spreadsheet exports
    fs::write(&path, format!("\u{feff}{}\n", body)).unwrap();
    path
}

fn create_test_transactions(dir: &Path, rows: &[&str]) -> PathBuf {
    let path = dir.join("transactions.csv");
    let mut body = vec![TX_HEADER.to_string()];
    body.extend(rows.iter().map(|r| r.to_string()));
    fs::write(&path, body.join("\n") + "\n").unwrap();
    path
}

fn read_without_bom(path: &Path) -> String {
    fs::read_to_string(path).unwrap().trim_start_matches('\u{feff}').to_string()
}

#[test]
fn test_clean_run_writes_outputs_and_discards_intermediate() {
    let dir = tempfile::tempdir().unwrap();
    let items = create_test_items(dir.path());
    let transactions = create_test_transactions(
        dir.path(),
        &[
            "1001,C1,INV1,2,3.50,2024-01-01T10:00:00",
            "3001,C2,INV2,1,7.00,2024-01-02T11:00:00",
            "5001,C3,INV3,1,9.99,2024-01-03T12:00:00",
        ],
    );
    let out = dir.path().join("out");

    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let run = pipeline.run_files(&items, &transactions, &out, None).unwrap();

    assert_eq!(run.summary.verdict, Verdict::Complete);
    assert_eq!(run.summary.items_original, 5);
    // 1001 → 1002 by description, 3001 → 3002 by Arabic short description
    assert_eq!(run.summary.items_consolidated, 3);
    assert_eq!(run.summary.items_removed, 2);
    assert_eq!(run.summary.transactions_affected, 2);

    let config = PipelineConfig::default();
    let consolidated = Catalog::from_path(&out.join(&config.output.consolidated_items), &config.item_columns).unwrap();
    let remapped = TransactionLog::from_path(
        &out.join(&config.output.remapped_transactions),
        &config.transaction_columns,
    )
    .unwrap();

    let barcodes: HashSet<&str> = consolidated.items.iter().map(|i| i.barcode.as_str()).collect();
    assert_eq!(barcodes, ["1002", "3002", "5001"].into_iter().collect());

    let refs: Vec<&str> = remapped.transactions.iter().map(|t| t.item_barcode.as_str()).collect();
    assert_eq!(refs, vec!["1002", "3002", "5001"]);
    // other columns untouched
    assert_eq!(remapped.transactions[0].unit_price, "3.50");

    // singleton survives with its original fields
    let lone = consolidated.items.iter().find(|i| i.barcode == "5001").unwrap();
    assert_eq!(lone.en_short_desc.as_deref(), Some("Lone Lantern Large"));
    assert_eq!(lone.category_levels[0].as_deref(), Some("Outdoor"));

    let removed_log = read_without_bom(&out.join(&config.output.removed_items_log));
    assert!(removed_log.contains("duplicate of 1002"));
    assert!(removed_log.contains("duplicate of 3002"));

    assert!(out.join(&config.output.summary).exists());
    assert!(!out.join(&config.output.annotated_catalog).exists());

    println!("✅ Clean run: {}", run.summary.render());
}

#[test]
fn test_unknown_reference_quarantined_and_intermediate_retained() {
    let dir = tempfile::tempdir().unwrap();
    let items = create_test_items(dir.path());
    let transactions = create_test_transactions(
        dir.path(),
        &[
            "9999,C1,INV1,1,1.00,2024-01-01T10:00:00",
            "1001,C1,INV1,1,1.00,2024-01-01T10:00:00",
        ],
    );
    let out = dir.path().join("out");
    let config = PipelineConfig::default();

    let mut ledger = RunLedger::open_in_memory().unwrap();
    let pipeline = Pipeline::new(config.clone()).unwrap();
    let run = pipeline
        .run_files(&items, &transactions, &out, Some(&mut ledger))
        .unwrap();

    assert_eq!(run.summary.verdict, Verdict::NeedsAttention);
    assert_eq!(run.summary.quarantined_refs, vec!["9999".to_string()]);
    assert_eq!(run.summary.unresolved_refs, 1);

    // row kept unmodified in the remapped log
    let remapped = TransactionLog::from_path(
        &out.join(&config.output.remapped_transactions),
        &config.transaction_columns,
    )
    .unwrap();
    assert_eq!(remapped.len(), 2);
    assert_eq!(remapped.transactions[0].item_barcode, "9999");

    let quarantine = read_without_bom(&out.join(&config.output.quarantine_log));
    assert!(quarantine.contains("item 9999 not found in catalog"));

    // cleanup gate: nothing destructive after a failed verification
    assert!(out.join(&config.output.annotated_catalog).exists());

    let events = ledger.events_for_run(&run.summary.run_id).unwrap();
    assert!(events.iter().any(|e| e.event_type == "transaction_quarantined" && e.entity_id == "INV1"));
    assert_eq!(events.last().unwrap().event_type, "run_verified");

    // per-item history, as `history --item` shows it
    let item_events = ledger.events_for_entity("item", "1001").unwrap();
    assert_eq!(item_events.len(), 1);
    assert_eq!(item_events[0].event_type, "item_removed");
    assert_eq!(item_events[0].data["canonical"], "1002");

    println!("✅ Unknown reference surfaced: {:?}", run.summary.quarantined_refs);
}

#[test]
fn test_coverage_and_no_loss() {
    let dir = tempfile::tempdir().unwrap();
    let items = create_test_items(dir.path());
    let transactions = create_test_transactions(
        dir.path(),
        &[
            "1001,C1,INV1,1,1,",
            "1002,C1,INV1,1,1,",
            "3001,C2,INV2,1,1,",
            "7777,C3,INV3,1,1,",
        ],
    );
    let out = dir.path().join("out");

    let run = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .run_files(&items, &transactions, &out, None)
        .unwrap();

    // no loss
    assert_eq!(
        run.consolidation.catalog.len() + run.consolidation.removed.len(),
        run.summary.items_original
    );

    // coverage: each reference is in the catalog or the quarantine, never both
    let surviving = run.consolidation.barcodes();
    let quarantined: HashSet<String> = run.summary.quarantined_refs.iter().cloned().collect();
    for tx in &run.remap.log.transactions {
        assert!(surviving.contains(tx.item_barcode.as_str()) ^ quarantined.contains(&tx.item_barcode));
    }

    // closure: every map target is a surviving barcode
    assert!(run.map.is_closed());
    for (_, canonical) in run.map.iter() {
        assert!(surviving.contains(canonical));
    }
}

#[test]
fn test_missing_column_is_fatal_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    let items = dir.path().join("items.csv");
    fs::write(&items, "BARCODE,EN_SHORT_DESC\n1001,WIDGET\n").unwrap();
    let transactions = create_test_transactions(dir.path(), &["1001,C1,INV1,1,1,"]);
    let out = dir.path().join("out");

    let err = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .run_files(&items, &transactions, &out, None)
        .unwrap_err();

    match err {
        CanonError::MissingColumns { table, columns } => {
            assert_eq!(table, "item");
            assert!(columns.contains(&"EN_FULL_DESCRIPTION".to_string()));
        }
        other => panic!("expected MissingColumns, got {:?}", other),
    }
    assert!(!out.exists());
}

#[test]
fn test_keep_intermediates_flag() {
    let dir = tempfile::tempdir().unwrap();
    let items = create_test_items(dir.path());
    let transactions = create_test_transactions(dir.path(), &["1002,C1,INV1,1,1,"]);
    let out = dir.path().join("out");

    let config = PipelineConfig {
        keep_intermediates: true,
        ..PipelineConfig::default()
    };
    let run = Pipeline::new(config.clone())
        .unwrap()
        .run_files(&items, &transactions, &out, None)
        .unwrap();

    assert!(run.summary.is_complete());
    assert!(out.join(&config.output.annotated_catalog).exists());
}
