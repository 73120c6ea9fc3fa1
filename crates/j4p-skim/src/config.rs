//! Skim configuration.
//!
//! The same [`SkimConfig`] is filled from command-line flags or read from a
//! YAML/JSON file; [`SkimConfig::validate`] then enforces the preconditions
//! of a run before anything is opened.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use j4p_core::{Dataset, Error, Result};
use serde::{Deserialize, Serialize};

use crate::lists::read_list_file;

/// Redirector prefix used for remote partitions.
pub const DEFAULT_REDIRECTOR: &str = "https://cms-xrd-global.cern.ch/";
/// Entries per parallel chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;
/// Tag used in the output name when none is given.
pub const DEFAULT_RUN_TAG: &str = "unknown";

/// Inclusive run range, written `"<first>,<last>"`. Only used for naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunRange {
    pub first: u32,
    pub last: u32,
}

impl FromStr for RunRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad =
            || Error::Config(format!("malformed run range '{s}' (expected '<first>,<last>')"));
        let (a, b) = s.split_once(',').ok_or_else(bad)?;
        let first: u32 = a.trim().parse().map_err(|_| bad())?;
        let last: u32 = b.trim().parse().map_err(|_| bad())?;
        if first > last {
            return Err(Error::Config(format!(
                "run range '{s}': first run {first} is after last run {last}"
            )));
        }
        Ok(Self { first, last })
    }
}

impl TryFrom<String> for RunRange {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<RunRange> for String {
    fn from(r: RunRange) -> Self {
        r.to_string()
    }
}

impl fmt::Display for RunRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.first, self.last)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkimConfig {
    /// Input partitions (directories, or paths below the redirector).
    #[serde(default)]
    pub files: Vec<String>,

    /// List file with one partition per line; alternative to `files`.
    #[serde(default)]
    pub filepath: Option<PathBuf>,

    /// Trigger names, OR-ed. Empty accepts every event.
    #[serde(default)]
    pub triggers: Vec<String>,

    /// List file with one trigger per line; alternative to `triggers`.
    #[serde(default)]
    pub triggerpath: Option<PathBuf>,

    /// Golden run/lumi JSON. Absent: no lumi filtering.
    #[serde(default)]
    pub golden_json: Option<PathBuf>,

    pub dataset: Dataset,

    #[serde(default)]
    pub run_range: Option<RunRange>,

    #[serde(default = "default_run_tag")]
    pub run_tag: String,

    #[serde(default)]
    pub is_mc: bool,

    /// Read partitions from the local filesystem instead of the redirector.
    #[serde(default)]
    pub is_local: bool,

    #[serde(default = "default_redirector")]
    pub redirector: String,

    /// Worker threads (0 = rayon default).
    #[serde(default)]
    pub threads: usize,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_tight_jet_id")]
    pub tight_jet_id: i32,

    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
}

fn default_run_tag() -> String {
    DEFAULT_RUN_TAG.to_string()
}

fn default_redirector() -> String {
    DEFAULT_REDIRECTOR.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_tight_jet_id() -> i32 {
    crate::quality::TIGHT_JET_ID
}

fn default_out_dir() -> PathBuf {
    PathBuf::from(".")
}

impl SkimConfig {
    /// Config with defaults for everything but the inputs and the dataset.
    pub fn new(files: Vec<String>, dataset: Dataset) -> Self {
        Self {
            files,
            filepath: None,
            triggers: Vec::new(),
            triggerpath: None,
            golden_json: None,
            dataset,
            run_range: None,
            run_tag: default_run_tag(),
            is_mc: false,
            is_local: false,
            redirector: default_redirector(),
            threads: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            tight_jet_id: default_tight_jet_id(),
            out_dir: default_out_dir(),
        }
    }

    /// Replace `filepath` / `triggerpath` by the entries they list.
    pub fn resolve_lists(&mut self) -> Result<()> {
        if let Some(path) = self.filepath.take() {
            if !self.files.is_empty() {
                return Err(Error::Config(
                    "give either a file list or a file path, not both".into(),
                ));
            }
            self.files = read_list_file(&path)?;
        }
        if let Some(path) = self.triggerpath.take() {
            if !self.triggers.is_empty() {
                return Err(Error::Config(
                    "give either a trigger list or a trigger path, not both".into(),
                ));
            }
            self.triggers = read_list_file(&path)?;
        }
        Ok(())
    }

    /// Check the preconditions of a run.
    pub fn validate(&self) -> Result<()> {
        if self.filepath.is_some() || self.triggerpath.is_some() {
            return Err(Error::Config("list paths must be resolved before validation".into()));
        }
        if self.files.is_empty() {
            return Err(Error::Config(
                "no input files given (use a file list or a file path)".into(),
            ));
        }
        if self.is_mc && self.run_range.is_some() {
            return Err(Error::Config("run range cannot be used with Monte-Carlo input".into()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be > 0".into()));
        }
        if self.run_tag.trim().is_empty() || self.run_tag.contains(['/', '\\']) {
            return Err(Error::Config(format!("invalid run tag '{}'", self.run_tag)));
        }
        Ok(())
    }

    /// Name of the output directory below `out_dir`.
    pub fn output_stem(&self) -> String {
        match self.run_range {
            Some(r) => format!("J4PSkim_runs{}to{}_{}", r.first, r.last, self.run_tag),
            None => format!("J4PSkim_{}", self.run_tag),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.out_dir.join(self.output_stem())
    }
}

/// Read a skim config; `.json` is parsed as JSON, anything else as YAML.
/// Relative list paths are resolved against the config file's directory.
pub fn read_skim_config(path: &Path) -> Result<SkimConfig> {
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let mut cfg: SkimConfig = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?
    };

    let base = path.parent().unwrap_or(Path::new("."));
    for p in [&mut cfg.filepath, &mut cfg.triggerpath, &mut cfg.golden_json].into_iter().flatten() {
        if p.is_relative() {
            *p = base.join(&*p);
        }
    }
    cfg.resolve_lists()?;
    Ok(cfg)
}
