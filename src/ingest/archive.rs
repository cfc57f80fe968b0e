use flate2::read::GzDecoder;
use log::{debug, info, warn};
use polars::prelude::*;
use std::io::{Cursor, Read};
use tar::Archive;
use ::zip::ZipArchive;

use super::table::{canonicalize_columns, normalize_column_names, read_csv_bytes};
use super::{empty_record_frame, IngestWarning, IngestedBatch};
use crate::common::{create_count_progress_bar, create_spinner};
use crate::error::{PipelineError, Result};
use crate::RESEARCHER_COL;

/// Researcher display name carried by an archive member path:
/// base name, extension stripped, underscores as spaces.
pub fn researcher_from_path(path: &str) -> String {
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    stem.replace('_', " ")
}

/// Whether an archive member is a researcher CSV
pub fn is_researcher_member(path: &str) -> bool {
    let lower = path.to_lowercase();
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    lower.ends_with(".csv")
        && !path.split(['/', '\\']).any(|part| part == "__MACOSX")
        && !base.starts_with("._")
}

/// Recover a member name. Tools that wrote UTF-8 names without flagging
/// them get their names decoded as CP437 by the archive reader, so the raw
/// bytes are tried as UTF-8 first.
pub fn decode_entry_name(raw: &[u8], decoded: &str) -> String {
    match std::str::from_utf8(raw) {
        Ok(name) => name.to_string(),
        Err(_) => decoded.to_string(),
    }
}

/// Accumulates member frames and per-file warnings
#[derive(Default)]
struct MemberCollector {
    frames: Vec<DataFrame>,
    warnings: Vec<IngestWarning>,
    files_read: usize,
    files_skipped: usize,
}

impl MemberCollector {
    fn skip(&mut self, file: &str, message: String) {
        warn!("Skipping {}: {}", file, message);
        self.files_skipped += 1;
        self.warnings.push(IngestWarning {
            file: file.to_string(),
            message,
        });
    }

    fn add(&mut self, path: &str, bytes: &[u8]) {
        let researcher = researcher_from_path(path);
        match load_member(bytes, &researcher) {
            Ok(df) => {
                debug!("Read {} ({} rows) for '{}'", path, df.height(), researcher);
                self.files_read += 1;
                if df.height() > 0 {
                    self.frames.push(df);
                }
            }
            Err(e) => self.skip(path, e.to_string()),
        }
    }

    fn finish(self) -> Result<IngestedBatch> {
        let frame = if self.frames.is_empty() {
            empty_record_frame()?
        } else {
            polars::functions::concat_df_diagonal(&self.frames)?
        };

        info!(
            "Ingested {} rows from {} files ({} skipped)",
            frame.height(),
            self.files_read,
            self.files_skipped
        );

        Ok(IngestedBatch {
            frame,
            warnings: self.warnings,
            files_read: self.files_read,
            files_skipped: self.files_skipped,
        })
    }
}

fn load_member(bytes: &[u8], researcher: &str) -> Result<DataFrame> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(PipelineError::Parse("empty file".to_string()));
    }
    let mut df = read_csv_bytes(bytes)?;
    normalize_column_names(&mut df)?;
    canonicalize_columns(&mut df)?;
    let height = df.height();
    df.with_column(Series::new(
        RESEARCHER_COL.into(),
        vec![researcher.to_string(); height],
    ))?;
    Ok(df)
}

/// Ingest an archive of per-researcher CSV files (ZIP or tar.gz, detected
/// from the leading bytes). Unreadable members are skipped with a warning.
pub fn ingest_archive(bytes: &[u8]) -> Result<IngestedBatch> {
    if bytes.starts_with(b"PK") {
        ingest_zip(bytes)
    } else if bytes.starts_with(&[0x1f, 0x8b]) {
        ingest_tar_gz(bytes)
    } else {
        Err(PipelineError::Archive(
            "unrecognized archive format (expected ZIP or tar.gz)".to_string(),
        ))
    }
}

fn ingest_zip(bytes: &[u8]) -> Result<IngestedBatch> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::Archive(format!("invalid ZIP archive: {e}")))?;

    let mut collector = MemberCollector::default();
    let progress = create_count_progress_bar(archive.len() as u64);

    for index in 0..archive.len() {
        progress.inc(1);
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                collector.skip(&format!("#{}", index), e.to_string());
                continue;
            }
        };

        if entry.is_dir() {
            continue;
        }

        let name = decode_entry_name(entry.name_raw(), entry.name());
        if !is_researcher_member(&name) {
            continue;
        }

        progress.set_message(name.clone());

        let mut content = Vec::new();
        if let Err(e) = entry.read_to_end(&mut content) {
            collector.skip(&name, e.to_string());
            continue;
        }

        collector.add(&name, &content);
    }

    progress.finish_and_clear();
    collector.finish()
}

fn ingest_tar_gz(bytes: &[u8]) -> Result<IngestedBatch> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let entries = archive
        .entries()
        .map_err(|e| PipelineError::Archive(format!("invalid tar.gz archive: {e}")))?;

    let mut collector = MemberCollector::default();
    let progress = create_spinner("Reading archive members...");

    for entry_result in entries {
        let mut entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                // The stream cannot be resynchronised after a corrupt header
                collector.skip("<tar stream>", e.to_string());
                break;
            }
        };

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let raw = entry.path_bytes().into_owned();
        let name = match String::from_utf8(raw) {
            Ok(name) => name,
            Err(e) => e.as_bytes().iter().map(|&b| b as char).collect(),
        };
        if !is_researcher_member(&name) {
            continue;
        }

        progress.set_message(name.clone());

        let mut content = Vec::new();
        if let Err(e) = entry.read_to_end(&mut content) {
            collector.skip(&name, e.to_string());
            continue;
        }

        collector.add(&name, &content);
    }

    progress.finish_and_clear();
    collector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::table::text_values;
    use std::io::Write;
    use ::zip::write::SimpleFileOptions;
    use ::zip::ZipWriter;

    fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_researcher_from_path() {
        assert_eq!(researcher_from_path("export/Ana_Maria_Souza.csv"), "Ana Maria Souza");
        assert_eq!(researcher_from_path("Joao.Silva.csv"), "Joao.Silva");
        assert_eq!(researcher_from_path("dir\\Bia.CSV"), "Bia");
    }

    #[test]
    fn test_member_filter() {
        assert!(is_researcher_member("ppge/Ana.csv"));
        assert!(is_researcher_member("Ana.CSV"));
        assert!(!is_researcher_member("__MACOSX/ppge/._Ana.csv"));
        assert!(!is_researcher_member("ppge/._Ana.csv"));
        assert!(!is_researcher_member("ppge/readme.txt"));
    }

    #[test]
    fn test_decode_entry_name_prefers_utf8() {
        let raw = "João.csv".as_bytes();
        assert_eq!(decode_entry_name(raw, "Jo├úo.csv"), "João.csv");
        assert_eq!(decode_entry_name(b"Jo\x86o.csv", "Jo\u{e5}o.csv"), "Jo\u{e5}o.csv");
    }

    #[test]
    fn test_ingest_zip_tags_researchers_and_skips_bad_files() {
        let bytes = build_zip(&[
            ("Ana_Souza.csv", b"ISSN,Titulo,Qualis,Ano_Publicacao\n0100-1965,Paper A,A1,2020\n"),
            ("Bruno_Lima.csv", b"issn;titulo\n1234-5678;Paper B\n"),
            ("broken.csv", b""),
            ("notes.txt", b"ignored"),
            ("__MACOSX/._Ana_Souza.csv", b"junk"),
        ]);

        let batch = ingest_archive(&bytes).unwrap();
        assert_eq!(batch.files_read, 2);
        assert_eq!(batch.files_skipped, 1);
        assert_eq!(batch.warnings[0].file, "broken.csv");
        assert_eq!(batch.frame.height(), 2);

        let researchers = text_values(&batch.frame, RESEARCHER_COL).unwrap();
        assert_eq!(
            researchers,
            vec![Some("Ana Souza".to_string()), Some("Bruno Lima".to_string())]
        );
        let issns = text_values(&batch.frame, "issn").unwrap();
        assert_eq!(issns[1].as_deref(), Some("1234-5678"));

        // Members with fewer columns are padded with nulls
        let years = text_values(&batch.frame, "ano_publicacao").unwrap();
        assert_eq!(years, vec![Some("2020".to_string()), None]);
        assert_eq!(
            text_values(&batch.frame, "qualis").unwrap(),
            vec![Some("A1".to_string()), None]
        );
    }

    #[test]
    fn test_ingest_tar_gz() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let content = b"issn,qualis\n0100-1965,B2\n";
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_path("ppge/Carla_Dias.csv").unwrap();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &content[..]).unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let batch = ingest_archive(&bytes).unwrap();
        assert_eq!(batch.frame.height(), 1);
        assert_eq!(
            text_values(&batch.frame, RESEARCHER_COL).unwrap()[0].as_deref(),
            Some("Carla Dias")
        );
    }

    #[test]
    fn test_ingest_rejects_unknown_container() {
        assert!(matches!(
            ingest_archive(b"plain text"),
            Err(PipelineError::Archive(_))
        ));
    }

    #[test]
    fn test_ingest_empty_zip() {
        let bytes = build_zip(&[]);
        let batch = ingest_archive(&bytes).unwrap();
        assert_eq!(batch.frame.height(), 0);
        assert!(batch.frame.column(RESEARCHER_COL).is_ok());
    }
}
