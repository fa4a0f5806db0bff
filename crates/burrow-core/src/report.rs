//! Human-readable statistics reports.
//!
//! Each report is a small plain-text file named
//! `burrow_report_<YYYY-MM-DD_HH-MM-SS>.txt` (UTC) inside the configured
//! reports directory. Files are created with `create_new`, so two reports
//! generated within the same second do not overwrite each other: the second
//! fails with [`ReportError::Collision`] and is skipped for that cycle.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt as _;

use crate::stats::{BurrowStats, RankedBurrow};

/// File name prefix shared by all reports.
pub const REPORT_PREFIX: &str = "burrow_report_";

/// Timestamp layout embedded in report file names.
const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Timestamp layout printed inside the report.
const BODY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Errors that can occur while persisting a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The reports directory could not be created.
    #[error("failed to create reports directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A report for the same second already exists.
    #[error("report {path} already exists")]
    Collision {
        /// The existing report file.
        path: PathBuf,
    },

    /// The report file could not be written.
    #[error("failed to write report {path}: {source}")]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// What a report pass produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// A report was written to this path.
    Written(PathBuf),
    /// There were no burrows, so nothing was written.
    Skipped,
}

/// Render a report body.
///
/// The output depends only on its arguments.
pub fn format_report(stats: &BurrowStats, generated_at: DateTime<Utc>) -> String {
    format!(
        "Burrow System Report\n\
         Generated at: {generated}\n\
         \n\
         Total Burrows: {count}\n\
         Total Depth: {depth:.2} meters\n\
         Available Burrows: {available}\n\
         Largest Burrow: {largest}\n\
         Smallest Burrow: {smallest}\n",
        generated = generated_at.format(BODY_TIMESTAMP_FORMAT),
        count = stats.burrow_count,
        depth = stats.total_depth,
        available = stats.available_count,
        largest = describe(stats.largest.as_ref()),
        smallest = describe(stats.smallest.as_ref()),
    )
}

fn describe(ranked: Option<&RankedBurrow>) -> String {
    ranked.map_or_else(
        || "none".to_owned(),
        |b| format!("{} ({:.2} cubic meters)", b.name, b.volume),
    )
}

/// File name of the report generated at `generated_at`.
pub fn report_file_name(generated_at: DateTime<Utc>) -> String {
    format!(
        "{REPORT_PREFIX}{}.txt",
        generated_at.format(FILE_TIMESTAMP_FORMAT)
    )
}

/// Writes reports into a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportWriter {
    directory: PathBuf,
}

impl ReportWriter {
    /// Create a writer targeting `directory`. Nothing touches the disk
    /// until the first report is saved.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Directory receiving reports.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Persist `text` as the report generated at `generated_at`.
    ///
    /// Creates the directory if needed and returns the written path.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Collision`] if a report with the same
    /// second-resolution name exists, or an I/O variant otherwise.
    pub async fn save(&self, text: &str, generated_at: DateTime<Utc>) -> Result<PathBuf, ReportError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| ReportError::CreateDir {
                path: self.directory.clone(),
                source,
            })?;

        let path = self.directory.join(report_file_name(generated_at));
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ReportError::Collision { path });
            }
            Err(source) => return Err(ReportError::Write { path, source }),
        };

        if let Err(source) = file.write_all(text.as_bytes()).await {
            return Err(ReportError::Write { path, source });
        }
        if let Err(source) = file.flush().await {
            return Err(ReportError::Write { path, source });
        }

        tracing::debug!(path = %path.display(), bytes = text.len(), "Report saved");
        Ok(path)
    }

    /// Format and save a report for `stats`, or skip it when the snapshot
    /// was empty.
    ///
    /// # Errors
    ///
    /// Propagates [`ReportError`] from [`save`](Self::save).
    pub async fn write(
        &self,
        stats: &BurrowStats,
        generated_at: DateTime<Utc>,
    ) -> Result<ReportOutcome, ReportError> {
        if stats.is_empty() {
            return Ok(ReportOutcome::Skipped);
        }
        let text = format_report(stats, generated_at);
        let path = self.save(&text, generated_at).await?;
        Ok(ReportOutcome::Written(path))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use burrow_types::BurrowId;
    use chrono::TimeZone as _;

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    fn stats() -> BurrowStats {
        BurrowStats {
            burrow_count: 2,
            total_depth: 15.0,
            available_count: 1,
            largest: Some(RankedBurrow {
                id: BurrowId(2),
                name: "Deep Hollow".to_owned(),
                volume: 70.685_834_705_770_35,
            }),
            smallest: Some(RankedBurrow {
                id: BurrowId(1),
                name: "Shallow Nook".to_owned(),
                volume: 15.707_963_267_948_966,
            }),
        }
    }

    #[test]
    fn report_body_is_deterministic() {
        let expected = "Burrow System Report\n\
                        Generated at: 2026-03-14 09:26:53 UTC\n\
                        \n\
                        Total Burrows: 2\n\
                        Total Depth: 15.00 meters\n\
                        Available Burrows: 1\n\
                        Largest Burrow: Deep Hollow (70.69 cubic meters)\n\
                        Smallest Burrow: Shallow Nook (15.71 cubic meters)\n";
        assert_eq!(format_report(&stats(), at()), expected);
        assert_eq!(format_report(&stats(), at()), format_report(&stats(), at()));
    }

    #[test]
    fn report_without_rankings_says_none() {
        let stats = BurrowStats {
            burrow_count: 0,
            total_depth: 0.0,
            available_count: 0,
            largest: None,
            smallest: None,
        };
        let body = format_report(&stats, at());
        assert_eq!(body.lines().count(), 8);
        assert!(body.ends_with("Largest Burrow: none\nSmallest Burrow: none\n"));
        assert!(body.contains("Total Depth: 0.00 meters\n"));
    }

    #[test]
    fn file_name_embeds_second_resolution_timestamp() {
        assert_eq!(
            report_file_name(at()),
            "burrow_report_2026-03-14_09-26-53.txt"
        );
    }

    #[tokio::test]
    async fn save_creates_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(tmp.path().join("nested").join("reports"));

        let path = writer.save("hello\n", at()).await.unwrap();
        assert!(path.starts_with(writer.directory()));
        let body = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(body, "hello\n");
    }

    #[tokio::test]
    async fn same_second_reports_collide_without_overwriting() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(tmp.path());

        let first = writer.save("first\n", at()).await.unwrap();
        let later_same_second = at() + chrono::TimeDelta::milliseconds(400);
        let second = writer.save("second\n", later_same_second).await;

        assert!(matches!(second, Err(ReportError::Collision { ref path }) if *path == first));
        let body = tokio::fs::read_to_string(&first).await.unwrap();
        assert_eq!(body, "first\n");
    }

    #[tokio::test]
    async fn empty_stats_write_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("reports");
        let writer = ReportWriter::new(&dir);

        let outcome = writer.write(&BurrowStats::default(), at()).await.unwrap();
        assert_eq!(outcome, ReportOutcome::Skipped);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn unwritable_directory_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        tokio::fs::write(&blocker, b"x").await.unwrap();
        let writer = ReportWriter::new(blocker.join("reports"));

        let result = writer.write(&stats(), at()).await;
        assert!(matches!(result, Err(ReportError::CreateDir { .. })));
    }
}
