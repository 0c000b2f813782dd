use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use graphseed_import::ImportReport;
use serde::Serialize;

use super::{RegistryError, RegistryResult};

/// Serializable options for import runs.
#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub flush_interval: usize,
    pub export: bool,
}

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub model_version: String,
    pub run_dir: PathBuf,
    pub model_path: PathBuf,
    pub plan_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub options: RunOptions,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub model_version: String,
    pub model_path: PathBuf,
    pub plan_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub options: RunOptions,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub run_root: PathBuf,
    pub logs_path: PathBuf,
    pub report_path: PathBuf,
    pub export_dir: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let run_root = ctx
        .run_dir
        .join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&run_root)?;

    let config_path = run_root.join("config.json");
    let logs_path = run_root.join("logs.ndjson");
    let report_path = run_root.join("import_report.json");
    let export_dir = run_root.join("export");

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        model_version: ctx.model_version.clone(),
        model_path: ctx.model_path.clone(),
        plan_path: ctx.plan_path.clone(),
        data_dir: ctx.data_dir.clone(),
        options: ctx.options.clone(),
        git: collect_git_info(),
    };

    write_json(&config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        run_root,
        logs_path,
        report_path,
        export_dir,
    })
}

pub fn write_report(paths: &RunPaths, report: &ImportReport) -> RegistryResult<()> {
    write_json(&paths.report_path, report)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_run_lays_out_the_run_directory() {
        let run_dir = std::env::temp_dir().join(format!("graphseed_runs_{}", uuid::Uuid::new_v4()));
        let ctx = RunContext {
            run_id: "abc".to_string(),
            started_at: Utc::now(),
            model_version: "1".to_string(),
            run_dir: run_dir.clone(),
            model_path: PathBuf::from("model.json"),
            plan_path: None,
            data_dir: PathBuf::from("data"),
            options: RunOptions {
                flush_interval: 10,
                export: true,
            },
        };

        let paths = start_run(&ctx).expect("start run");
        assert!(paths.run_root.starts_with(&run_dir));
        let name = paths.run_root.file_name().and_then(|n| n.to_str()).expect("utf-8");
        assert!(name.ends_with("__run_abc"));
        assert!(paths.logs_path.exists());

        let config: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(paths.run_root.join("config.json")).expect("config"),
        )
        .expect("config json");
        assert_eq!(config["run_id"], "abc");
        assert_eq!(config["options"]["flush_interval"], 10);
        assert!(config["plan_path"].is_null());

        let mut report = ImportReport::new(ctx.run_id.clone());
        report.error = Some("boom".to_string());
        write_report(&paths, &report).expect("report");
        let written: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(&paths.report_path).expect("report file"),
        )
        .expect("report json");
        assert_eq!(written["error"], "boom");

        std::fs::remove_dir_all(&run_dir).ok();
    }
}
