// CSV ingest through the engine: the CsvScan plan streaming typed batches,
// fail-fast parse errors, and export back to an external file.

mod common;

use common::*;
use fusedb::execution::BufferingConsumer;
use fusedb::plan::{CsvScanPlan, ExportExternalFilePlan, PlanNode};
use fusedb::types::{LogicalType, Value};
use fusedb::DbError;
use std::io::Write;
use std::sync::Arc;

fn csv_file(content: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.flush().unwrap();
    f
}

fn csv_scan(path: &std::path::Path, types: Vec<LogicalType>) -> PlanNode {
    PlanNode::CsvScan(CsvScanPlan {
        path: path.to_string_lossy().into_owned(),
        column_types: types,
        delimiter: ',',
        quote: '"',
        escape: '"',
    })
}

#[test]
fn typed_rows_reach_the_consumer() {
    let db = test_db();
    let f = csv_file("1,2,3.0,4\n4,5,6.0,7\n8,9,10.0,11\n");
    let plan = csv_scan(
        f.path(),
        vec![LogicalType::Integer, LogicalType::Integer, LogicalType::Decimal, LogicalType::Integer],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 3);
    for row in &rows {
        assert_eq!(row.len(), 4);
        assert!(row.iter().all(|v| !v.is_null()));
    }
    assert_eq!(rows[0][0], Value::integer(1));
    assert_eq!(rows[1][2], Value::decimal(6.0));
    assert_eq!(rows[2][3], Value::integer(11));
}

#[test]
fn quoted_text_survives_escape_processing() {
    let db = test_db();
    let f = csv_file("yea he's \"cool\",1,2\n");
    let plan = csv_scan(
        f.path(),
        vec![LogicalType::Varchar, LogicalType::Integer, LogicalType::Integer],
    );
    let rows = run(&db, plan, &[]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::varchar("yea he's \"cool\""));
}

#[test]
fn malformed_quote_fails_the_query() {
    let db = test_db();
    let f = csv_file("1,\"unclosed,3\n");
    let plan = Arc::new(csv_scan(
        f.path(),
        vec![LogicalType::Integer, LogicalType::Varchar, LogicalType::Integer],
    ));
    let txn = db.begin();
    let mut consumer = BufferingConsumer::new();
    let err = db.execute(&plan, &txn, &[], &mut consumer, None).unwrap_err();
    assert!(matches!(err, DbError::CsvParse { .. }), "got {err:?}");
    db.commit(&txn).unwrap();
}

#[test]
fn bad_field_type_reports_its_line() {
    let db = test_db();
    let f = csv_file("1,a\n2,b\nthree,c\n");
    let plan = Arc::new(csv_scan(f.path(), vec![LogicalType::Integer, LogicalType::Varchar]));
    let txn = db.begin();
    let mut consumer = BufferingConsumer::new();
    match db.execute(&plan, &txn, &[], &mut consumer, None) {
        Err(DbError::CsvParse { line, .. }) => assert_eq!(line, 3),
        other => panic!("expected a CSV parse error, got {other:?}"),
    }
    db.commit(&txn).unwrap();
}

#[test]
fn export_writes_csv_round_trippable_by_the_scanner() {
    let db = test_db();
    let oid = create_test_table(&db);
    let out = tempfile::NamedTempFile::new().unwrap();
    let plan = PlanNode::ExportExternalFile(ExportExternalFilePlan {
        child: Box::new(scan(oid, None, vec![0, 3])),
        path: out.path().to_string_lossy().into_owned(),
        delimiter: ',',
        quote: '"',
        escape: '"',
    });
    let rows = run(&db, plan, &[]);
    assert!(rows.is_empty(), "export produces no result rows");

    let text = std::fs::read_to_string(out.path()).unwrap();
    assert_eq!(text.lines().count(), 64);
    assert!(text.starts_with("0,3\n"));

    // The exported file reads back with the CSV scan.
    let reread = run(
        &db,
        csv_scan(out.path(), vec![LogicalType::Integer, LogicalType::Varchar]),
        &[],
    );
    assert_eq!(reread.len(), 64);
    assert_eq!(reread[63][0], Value::integer(630));
    assert_eq!(reread[63][1], Value::varchar("633"));
}

#[test]
fn fields_with_delimiters_are_quoted_on_export() {
    let db = test_db();
    let table = db
        .create_table(
            "msg",
            fusedb::catalog::Schema::new(vec![fusedb::catalog::Column::new(
                "m",
                LogicalType::Varchar,
            )]),
        )
        .unwrap();
    let txn = db.begin();
    table.insert(&txn, vec![Value::varchar("a,b \"quoted\"")]).unwrap();
    db.commit(&txn).unwrap();

    let out = tempfile::NamedTempFile::new().unwrap();
    let plan = PlanNode::ExportExternalFile(ExportExternalFilePlan {
        child: Box::new(scan(table.oid(), None, vec![0])),
        path: out.path().to_string_lossy().into_owned(),
        delimiter: ',',
        quote: '"',
        escape: '"',
    });
    run(&db, plan, &[]);

    let reread = run(&db, csv_scan(out.path(), vec![LogicalType::Varchar]), &[]);
    assert_eq!(reread.len(), 1);
    assert_eq!(reread[0][0], Value::varchar("a,b \"quoted\""));
}
