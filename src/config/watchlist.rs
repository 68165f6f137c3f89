//! Watchlist Directory - File-backed Watchlist Source
//!
//! Every `*.txt` file in the directory with at least one recognized
//! section header is a candidate. Candidates are cycled in file-name
//! order; the directory is rescanned on each switch so files added
//! while running are picked up.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::domain::watchlist::{Watchlist, has_known_section};
use crate::ports::watchlist::WatchlistSource;

/// Selected when present at startup.
pub const DEFAULT_WATCHLIST: &str = "watchlist.txt";

/// Watchlists read from a directory of text files.
pub struct WatchlistDir {
  dir: PathBuf,
  /// File name of the current selection.
  selected: Mutex<String>,
}

impl WatchlistDir {
  /// Scan `dir` and select [`DEFAULT_WATCHLIST`] or the first candidate.
  pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
    let dir = dir.into();
    let candidates = scan(&dir)?;
    let Some(first) = candidates.first() else {
      bail!("No watchlist files with a recognized section in {}", dir.display());
    };

    let selected = candidates
      .iter()
      .find(|name| name.as_str() == DEFAULT_WATCHLIST)
      .unwrap_or(first)
      .clone();
    info!(dir = %dir.display(), count = candidates.len(), selected = %selected, "Watchlists found");

    Ok(Self {
      dir,
      selected: Mutex::new(selected),
    })
  }

  /// Candidate file names, sorted.
  pub fn candidates(&self) -> Result<Vec<String>> {
    scan(&self.dir)
  }

  fn load(&self, file_name: &str) -> Result<Watchlist> {
    let path = self.dir.join(file_name);
    let text = std::fs::read_to_string(&path)
      .with_context(|| format!("Failed to read watchlist {}", path.display()))?;
    let name = Path::new(file_name)
      .file_stem()
      .map_or_else(|| file_name.to_string(), |s| s.to_string_lossy().into_owned());
    Ok(Watchlist::parse(name, &text))
  }
}

impl WatchlistSource for WatchlistDir {
  fn current(&self) -> Result<Watchlist> {
    let selected = self.selected.lock().clone();
    self.load(&selected)
  }

  fn advance(&self) -> Result<Watchlist> {
    let candidates = self.candidates()?;
    if candidates.is_empty() {
      bail!("No watchlist files left in {}", self.dir.display());
    }

    let mut selected = self.selected.lock();
    let next = candidates
      .iter()
      .position(|name| *name == *selected)
      .map_or(0, |idx| (idx + 1) % candidates.len());
    let name = &candidates[next];

    let watchlist = self.load(name)?;
    if watchlist.is_empty() {
      bail!("{}: no tickers", watchlist.name);
    }
    debug!(from = %*selected, to = %name, "Watchlist advanced");
    selected.clone_from(name);
    Ok(watchlist)
  }
}

fn scan(dir: &Path) -> Result<Vec<String>> {
  let entries = std::fs::read_dir(dir)
    .with_context(|| format!("Failed to read watchlist directory {}", dir.display()))?;

  let mut names = Vec::new();
  for entry in entries {
    let path = entry?.path();
    if path.extension().and_then(|e| e.to_str()) != Some("txt") || !path.is_file() {
      continue;
    }
    // Unreadable files are skipped rather than failing the scan.
    let Ok(text) = std::fs::read_to_string(&path) else {
      continue;
    };
    if has_known_section(&text) {
      if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        names.push(name.to_string());
      }
    }
  }
  names.sort();
  Ok(names)
}
