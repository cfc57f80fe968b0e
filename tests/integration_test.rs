use polars::prelude::*;
use std::fs::{self, File};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;
use ::zip::write::SimpleFileOptions;
use ::zip::ZipWriter;

use qualis_reconciliation::aggregate::{global_yearly_totals, researcher_totals};
use qualis_reconciliation::catalog::{Catalog, ProgramEntry};
use qualis_reconciliation::groups::parse_roster_text;
use qualis_reconciliation::ingest::{text_values, SourceMode};
use qualis_reconciliation::pipeline::{build_report, reconcile_paths, reconcile_programs, ReportOptions};
use qualis_reconciliation::reconcile::ReconcileCache;
use qualis_reconciliation::{PipelineError, RESEARCHER_COL, SCORE_COL, TIER_COL};

/// Reference list with a duplicated ISSN (the first tier must win) and an
/// unweighted tier
fn create_test_reference(dir: &Path) -> PathBuf {
    let path = dir.join("qualis.csv");
    fs::write(
        &path,
        "ISSN;Titulo;Estrato\n0001-0001;Revista A;A1\n0100-1965;Revista B;B2\n0001-0001;Revista A;B4\n7777-7777;Revista C;C\n",
    )
    .unwrap();
    path
}

/// Archive with one CSV per researcher
fn create_test_archive(dir: &Path) -> PathBuf {
    let files: [(&str, &str); 3] = [
        (
            "ppge/ana.csv",
            "Titulo,ISSN,Qualis,Ano\nP1,00010001,B2,2020\nP2,,A1,2021\nP3,9999-9999,A2,2019\n",
        ),
        (
            "ppge/Maria_Souza.csv",
            "titulo,issn,qualis,ano_publicacao\nQ1,0100-1965,A1,2021.0\nQ2,7777-7777,A1,2022\n",
        ),
        ("__MACOSX/ppge/._ana.csv", "junk"),
    ];

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    let bytes = writer.finish().unwrap().into_inner();

    let path = dir.join("ppge.zip");
    fs::write(&path, bytes).unwrap();
    path
}

/// Consolidated snapshot of a second program
fn create_test_snapshot(dir: &Path) -> PathBuf {
    let path = dir.join("mdcc.parquet");
    let mut df = df!(
        "pesquisador" => ["Carlos Pereira", "Carlos Pereira", "Dora Lima"],
        "issn" => ["0100-1965", "0001-0001", "5555-5555"],
        "qualis" => ["B1", "A1", "A1"],
        "ano_publicacao" => ["2020", "2021", "2021"]
    )
    .unwrap();
    ParquetWriter::new(File::create(&path).unwrap()).finish(&mut df).unwrap();
    path
}

#[test]
fn test_report_help() {
    let status = Command::new("cargo")
        .args(["run", "--", "report", "--help"])
        .status()
        .expect("Failed to run report --help");

    assert!(status.success(), "Report --help should succeed");
}

#[test]
fn test_reconcile_uses_reference_tier_and_rejects_blank_issn() {
    let dir = tempdir().unwrap();
    let reference = create_test_reference(dir.path());
    let archive = create_test_archive(dir.path());

    let mut cache = ReconcileCache::in_memory();
    let run = reconcile_paths(&reference, &archive, SourceMode::Archive, &mut cache).unwrap();
    let result = &run.reconciliation;

    assert_eq!(run.stats.files_read, 2);
    assert_eq!(run.stats.records_ingested, 5);
    assert_eq!(run.stats.records_accepted, 3);
    assert_eq!(run.stats.records_rejected, 2);

    let names = text_values(&result.accepted, RESEARCHER_COL).unwrap();
    let tiers = text_values(&result.accepted, TIER_COL).unwrap();
    let ana = names.iter().position(|n| n.as_deref() == Some("ana")).unwrap();
    // The source claimed B2; the reference says A1
    assert_eq!(tiers[ana].as_deref(), Some("A1"));

    // Blank and unknown ISSNs are both rejected, grouped under the researcher
    assert!(result.exclusions.iter().all(|e| e.researcher == "ana"));
    let log = result.render_log();
    assert!(log.contains("RESEARCHER: ana"));
    assert!(log.contains("ISSN S/N (Qualis: A1) - P2"));
    assert!(log.contains("ISSN 9999-9999 (Qualis: A2) - P3"));
}

#[test]
fn test_reconciliation_is_cached_on_disk() {
    let dir = tempdir().unwrap();
    let reference = create_test_reference(dir.path());
    let archive = create_test_archive(dir.path());
    let cache_dir = dir.path().join("cache");

    let first = {
        let mut cache = ReconcileCache::with_dir(&cache_dir).unwrap();
        reconcile_paths(&reference, &archive, SourceMode::Archive, &mut cache).unwrap()
    };
    assert!(!first.stats.cache_hit);

    let mut cache = ReconcileCache::with_dir(&cache_dir).unwrap();
    let second = reconcile_paths(&reference, &archive, SourceMode::Archive, &mut cache).unwrap();
    assert!(second.stats.cache_hit);
    assert!(first.reconciliation.accepted.equals_missing(&second.reconciliation.accepted));
    assert_eq!(first.reconciliation.render_log(), second.reconciliation.render_log());
}

#[test]
fn test_single_source_report_with_roster() {
    let dir = tempdir().unwrap();
    let program = ProgramEntry {
        name: "PPGE".to_string(),
        reference: create_test_reference(dir.path()),
        source: create_test_archive(dir.path()),
        mode: None,
    };

    let mut cache = ReconcileCache::in_memory();
    let combined = reconcile_programs(&[program], &mut cache).unwrap();
    assert!(combined.log.starts_with("=== LOG: PPGE ==="));

    let roster = parse_roster_text("Ana, G1\nMaria Souza, G1\nMaria Souza, G2\nFantasma, G3\n");
    let options = ReportOptions {
        researcher_filter: None,
        roster: Some(roster),
    };
    let output = build_report(combined, &options).unwrap();
    let report = &output.report;

    assert!(!report.program_comparison);
    // Q2's reference tier is C, which carries no weight
    assert_eq!(report.stats.records_unscored, 1);
    assert_eq!(report.stats.records_scored, 2);

    // Ana's publication is weighted with the reference tier A1
    let ana = report.researchers.yearly.iter().find(|t| t.entity == "Ana").unwrap();
    assert_eq!(ana.total, 100.0);

    // Maria Souza counts in both of her groups; G3 has nobody and no row
    let groups = report.groups.as_ref().unwrap();
    let total_of = |g: &str| groups.shares.iter().find(|s| s.entity == g).map(|s| s.total);
    assert_eq!(total_of("G1"), Some(140.0));
    assert_eq!(total_of("G2"), Some(40.0));
    assert_eq!(total_of("G3"), None);

    let audit = report.audit.as_ref().unwrap();
    let g3 = audit.groups.iter().find(|g| g.group == "G3").unwrap();
    assert_eq!(g3.missing, vec!["Fantasma"]);
    assert!(audit.unmatched.is_empty());
}

#[test]
fn test_aggregate_properties() {
    let dir = tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.json");
    create_test_reference(dir.path());
    create_test_archive(dir.path());
    create_test_snapshot(dir.path());
    fs::write(
        &catalog_path,
        r#"{"programs": [
            {"name": "PPGE", "reference": "qualis.csv", "source": "ppge.zip"},
            {"name": "MDCC", "reference": "qualis.csv", "source": "mdcc.parquet", "mode": "columnar"}
        ]}"#,
    )
    .unwrap();

    let catalog = Catalog::load(&catalog_path).unwrap();
    let mut cache = ReconcileCache::in_memory();
    let combined = reconcile_programs(&catalog.programs, &mut cache).unwrap();
    assert!(combined.log.contains("=== LOG: MDCC ==="));

    let output = build_report(combined, &ReportOptions::default()).unwrap();
    let report = &output.report;
    assert!(report.program_comparison);

    // Score conservation per year
    let per_researcher = researcher_totals(&output.records).unwrap();
    for year in global_yearly_totals(&output.records).unwrap() {
        let sum: f64 = per_researcher.iter().filter(|t| t.year == year.year).map(|t| t.total).sum();
        assert!((sum - year.total).abs() < 1e-9);
    }

    // Cumulative totals never decrease
    for entity in report.researchers.shares.iter().map(|s| &s.entity) {
        let series: Vec<f64> = report
            .researchers
            .yearly
            .iter()
            .filter(|t| &t.entity == entity)
            .map(|t| t.cumulative)
            .collect();
        assert!(series.windows(2).all(|w| w[0] <= w[1]));
    }

    // Global shares add up to 100
    let share_sum: f64 = report.researchers.shares.iter().map(|s| s.share).sum();
    assert!((share_sum - 100.0).abs() < 1e-6);

    // Programs act as groups
    let groups = report.groups.as_ref().unwrap();
    let names: Vec<&str> = groups.shares.iter().map(|s| s.entity.as_str()).collect();
    assert_eq!(names, vec!["MDCC", "PPGE"]);

    let weights = output.records.column(SCORE_COL).unwrap().f64().unwrap();
    assert!(weights.into_iter().all(|w| w.is_some_and(|w| w > 0.0)));
}

#[test]
fn test_filter_without_match_is_empty_result() {
    let dir = tempdir().unwrap();
    let program = ProgramEntry {
        name: "PPGE".to_string(),
        reference: create_test_reference(dir.path()),
        source: create_test_archive(dir.path()),
        mode: Some("archive".to_string()),
    };
    let mut cache = ReconcileCache::in_memory();
    let combined = reconcile_programs(&[program], &mut cache).unwrap();

    let options = ReportOptions {
        researcher_filter: Some("Nobody".to_string()),
        roster: None,
    };
    assert!(matches!(
        build_report(combined, &options),
        Err(PipelineError::EmptyResult(_))
    ));
}

#[test]
fn test_reconcile_command_end_to_end() {
    let dir = tempdir().unwrap();
    let reference = create_test_reference(dir.path());
    let archive = create_test_archive(dir.path());
    let output = dir.path().join("accepted.parquet");

    let status = Command::new("cargo")
        .args([
            "run",
            "--",
            "reconcile",
            "--reference",
            reference.to_str().unwrap(),
            "--source",
            archive.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ])
        .status()
        .expect("Failed to run reconcile");
    assert!(status.success(), "reconcile should succeed");

    let accepted = ParquetReader::new(File::open(&output).unwrap()).finish().unwrap();
    assert_eq!(accepted.height(), 3);

    let log = fs::read_to_string(dir.path().join("accepted_exclusions.txt")).unwrap();
    assert!(log.starts_with("EXCLUDED PUBLICATIONS REPORT"));
    assert!(log.contains("RESEARCHER: ana"));
}
