//! Worker process location and launch planning.
//!
//! Deployments differ: the worker directory may be given explicitly, sit
//! somewhere above the current working directory, or be reachable only
//! through a WSL-style `/mnt/<drive>/` mount. The resolver turns that mess
//! into either a concrete [`LaunchPlan`] or a failure that lists every path
//! it tried, so an operator can see at a glance what was probed.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

/// Fixed relative subpath probed during the upward directory walk.
pub const WORKER_SUBPATH: &str = "servers/mcp-crawler";

/// Worker entry point, relative to the worker directory.
pub const ENTRY_REL: &str = "bin/crawler-worker";

/// Maximum number of ancestor directories visited by the upward walk.
pub const MAX_WALK_LEVELS: usize = 8;

/// Bare command used as the executable probe's last resort.
pub const WORKER_COMMAND: &str = "crawler-worker";

/// Everything needed to spawn the worker subprocess.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPlan {
    pub worker_dir: PathBuf,
    pub exec_path: PathBuf,
    pub base_service_url: String,
    pub entry_rel: PathBuf,
    /// Every candidate directory tested, in order, for diagnostics.
    pub tried_paths: Vec<String>,
}

/// Resolver failure. Carries the full ordered candidate list.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error(
        "worker directory not found; paths tried:\n{}\nhint: set CRAWLER_WORKER_DIR to the absolute worker path",
        .tried.iter().map(|p| format!(" - {p}")).collect::<Vec<_>>().join("\n")
    )]
    WorkerDirNotFound { tried: Vec<String> },
}

impl ResolveError {
    /// The ordered list of candidate paths attempted before failing.
    pub fn tried_paths(&self) -> &[String] {
        match self {
            ResolveError::WorkerDirNotFound { tried } => tried,
        }
    }
}

fn wsl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^/mnt/([a-z])/(.*)$").expect("valid wsl regex"))
}

/// Translate a WSL `/mnt/<drive>/...` path into native Windows form.
///
/// Any other cross-filesystem convention is left untranslated; this is a
/// narrow special case for single-letter drive mounts, nothing more.
pub fn translate_wsl_path(p: &str) -> String {
    match wsl_re().captures(p) {
        Some(caps) => format!(
            "{}:\\{}",
            caps[1].to_uppercase(),
            caps[2].replace('/', "\\")
        ),
        None => p.to_string(),
    }
}

fn is_dir(p: &Path) -> bool {
    p.is_dir()
}

fn is_file(p: &Path) -> bool {
    p.is_file()
}

/// Locate the worker directory.
///
/// Order, first success wins:
/// 1. explicit override (WSL mount prefixes translated first);
/// 2. upward walk from `cwd`, at most [`MAX_WALK_LEVELS`] levels, testing
///    [`WORKER_SUBPATH`] at each level;
/// 3. none — a final fallback candidate is recorded for diagnostics and the
///    whole attempt list is returned in the error.
pub fn resolve_worker_dir(
    override_dir: Option<&str>,
    cwd: &Path,
) -> Result<(PathBuf, Vec<String>), ResolveError> {
    let mut tried: Vec<String> = Vec::new();

    if let Some(raw) = override_dir {
        let translated = if raw.starts_with("/mnt/") {
            translate_wsl_path(raw)
        } else {
            raw.to_string()
        };
        let candidate = PathBuf::from(&translated);
        tried.push(translated);
        if is_dir(&candidate) {
            return Ok((candidate, tried));
        }
    }

    let mut cur = cwd.to_path_buf();
    for _ in 0..MAX_WALK_LEVELS {
        let candidate = cur.join(WORKER_SUBPATH);
        tried.push(candidate.display().to_string());
        if is_dir(&candidate) {
            return Ok((candidate, tried));
        }
        match cur.parent() {
            Some(parent) => cur = parent.to_path_buf(),
            None => break,
        }
    }

    let fallback = cwd.join(WORKER_SUBPATH);
    tried.push(fallback.display().to_string());

    Err(ResolveError::WorkerDirNotFound { tried })
}

/// Resolve the worker executable. Independent of the directory probe and
/// infallible: some string always comes back, existing file or not.
///
/// Order: explicit override naming an existing file, the entry point under
/// the worker directory, well-known install locations, a sibling of the
/// currently running executable, and finally the bare command name.
pub fn resolve_worker_exe(override_bin: Option<&str>, worker_dir: Option<&Path>) -> PathBuf {
    if let Some(forced) = override_bin {
        let p = PathBuf::from(forced);
        if is_file(&p) {
            return p;
        }
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = worker_dir {
        candidates.push(dir.join(entry_rel()));
    }
    candidates.push(PathBuf::from("/usr/local/bin/crawler-worker"));
    candidates.push(PathBuf::from(
        "C:\\Program Files\\crawler-worker\\crawler-worker.exe",
    ));
    if let Ok(me) = env::current_exe() {
        if let Some(parent) = me.parent() {
            candidates.push(parent.join(worker_binary_name()));
        }
    }

    for candidate in candidates {
        if is_file(&candidate) {
            return candidate;
        }
    }

    PathBuf::from(WORKER_COMMAND)
}

fn worker_binary_name() -> String {
    format!("{}{}", WORKER_COMMAND, env::consts::EXE_SUFFIX)
}

fn entry_rel() -> PathBuf {
    let mut p = PathBuf::from(ENTRY_REL);
    if !env::consts::EXE_SUFFIX.is_empty() {
        p.set_extension(env::consts::EXE_SUFFIX.trim_start_matches('.'));
    }
    p
}

/// Compute a full launch plan from configuration, walking up from `cwd`.
pub fn launch_plan_from(cfg: &Config, cwd: &Path) -> Result<LaunchPlan, ResolveError> {
    let (worker_dir, tried_paths) = resolve_worker_dir(cfg.worker_dir_override.as_deref(), cwd)?;
    let exec_path = resolve_worker_exe(cfg.worker_exe_override.as_deref(), Some(&worker_dir));
    debug!(
        worker_dir = %worker_dir.display(),
        exec_path = %exec_path.display(),
        "resolved worker launch plan"
    );
    Ok(LaunchPlan {
        worker_dir,
        exec_path,
        base_service_url: cfg.base_service_url.clone(),
        entry_rel: entry_rel(),
        tried_paths,
    })
}

/// Compute a launch plan relative to the process working directory.
pub fn launch_plan(cfg: &Config) -> Result<LaunchPlan, ResolveError> {
    let cwd = env::current_dir().map_err(|_| ResolveError::WorkerDirNotFound {
        tried: vec!["<unreadable current directory>".to_string()],
    })?;
    launch_plan_from(cfg, &cwd)
}

/// Diagnostic launch-plan report. Never fails: when directory resolution
/// errors out, the error is reported alongside whatever else is known.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPlanReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<LaunchPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub exec_path: PathBuf,
    pub base_service_url: String,
    pub entry_rel: PathBuf,
}

/// Build the diagnostic report used by health endpoints.
pub fn debug_launch_plan(cfg: &Config) -> LaunchPlanReport {
    match launch_plan(cfg) {
        Ok(plan) => LaunchPlanReport {
            exec_path: plan.exec_path.clone(),
            base_service_url: plan.base_service_url.clone(),
            entry_rel: plan.entry_rel.clone(),
            plan: Some(plan),
            error: None,
        },
        Err(e) => LaunchPlanReport {
            plan: None,
            error: Some(e.to_string()),
            exec_path: resolve_worker_exe(cfg.worker_exe_override.as_deref(), None),
            base_service_url: cfg.base_service_url.clone(),
            entry_rel: entry_rel(),
        },
    }
}
