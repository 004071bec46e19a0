//! Ingest command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::error::{ReplikkError, Result};
use crate::index::create_index;
use crate::ingest::IngestPipeline;
use crate::script::ScriptFile;
use std::path::{Path, PathBuf};

/// File extensions recognized as movie scripts.
const SCRIPT_EXTENSIONS: &[&str] = &["json", "txt", "text"];

/// Run the ingest command.
pub async fn run_ingest(path: &str, force: bool, settings: Settings) -> Result<()> {
    let scripts = collect_script_paths(Path::new(path))?;

    if scripts.is_empty() {
        Output::warning(&format!("No script files found at {}", path));
        return Ok(());
    }

    Output::info(&format!("Found {} script file(s)", scripts.len()));

    let embedder = create_embedder(&settings).await?;
    let index = create_index(&settings)?;
    let pipeline = IngestPipeline::new(embedder, index.clone(), &settings);

    let mut total_indexed = 0;
    let mut total_skipped = 0;
    let mut failures = 0;

    for script_path in &scripts {
        let script = match ScriptFile::from_path(script_path) {
            Ok(s) => s,
            Err(e) => {
                Output::error(&format!("Skipping {}: {}", script_path.display(), e));
                failures += 1;
                continue;
            }
        };

        let bar = Output::progress_bar(0, &script.movie_title);
        let result = pipeline
            .ingest_script_with_progress(&script, force, |done, total| {
                bar.set_length(total as u64);
                bar.set_position(done as u64);
            })
            .await;
        bar.finish_and_clear();

        match result {
            Ok(report) => {
                Output::success(&format!(
                    "{}: {} chunks, {} indexed, {} skipped",
                    report.movie_title,
                    report.chunks_total,
                    report.chunks_indexed,
                    report.chunks_skipped
                ));
                if !report.failed_batches.is_empty() {
                    Output::warning(&format!(
                        "{}: {} batch(es) failed: {:?}",
                        report.movie_title,
                        report.failed_batches.len(),
                        report.failed_batches
                    ));
                    failures += 1;
                }
                total_indexed += report.chunks_indexed;
                total_skipped += report.chunks_skipped;
            }
            Err(e) => {
                Output::error(&format!("{}: {}", script.movie_title, e));
                failures += 1;
            }
        }
    }

    println!();
    Output::kv("Chunks indexed", &total_indexed.to_string());
    Output::kv("Chunks skipped", &total_skipped.to_string());
    let count = index.vector_count(&settings.index.namespace).await?;
    Output::kv("Vectors in index", &count.to_string());

    if failures > 0 {
        Output::warning(&format!("{} script(s) had failures", failures));
    }

    Ok(())
}

/// Gather script files from a file or directory path.
fn collect_script_paths(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    if !path.is_dir() {
        return Err(ReplikkError::Ingest(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }

    let mut scripts: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| SCRIPT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                    .unwrap_or(false)
        })
        .collect();
    scripts.sort();

    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_collect_script_paths_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["heat.txt", "alien.json", "notes.md", "blade.text"] {
            let mut f = std::fs::File::create(dir.path().join(name)).unwrap();
            writeln!(f, "content").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let scripts = collect_script_paths(dir.path()).unwrap();
        let names: Vec<_> = scripts
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();

        assert_eq!(names, vec!["alien.json", "blade.text", "heat.txt"]);
    }

    #[test]
    fn test_collect_script_paths_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("heat.txt");
        std::fs::write(&file, "dialogue").unwrap();

        let scripts = collect_script_paths(&file).unwrap();
        assert_eq!(scripts, vec![file]);
    }

    #[test]
    fn test_collect_script_paths_missing() {
        assert!(collect_script_paths(Path::new("/nonexistent/scripts")).is_err());
    }
}
