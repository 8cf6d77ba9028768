//! Path Cache - enumerated cycles on disk
//!
//! Enumeration is the expensive part of start-up, so the result is written
//! once and re-read on every later run. Each path takes two lines:
//!
//! ```text
//! Wrapped Ether/WETH,USD Coin/USDC,Wrapped Ether/WETH,
//! 0x82aF...Bab1,500,0xFF97...5CC8,3000,0x82aF...Bab1,
//! ```
//!
//! The first line holds the readable labels, the second the raw path
//! elements. Both are comma-terminated. A label line never parses as a
//! path, which lets `load` re-synchronise after a missing or damaged line.

use eyre::{eyre, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::brain::ArbPath;

/// Paths read back from the cache, index-aligned with their labels
#[derive(Debug, Clone, Default)]
pub struct CachedPaths {
    pub paths: Vec<ArbPath>,
    pub readable: Vec<Vec<String>>,
}

impl CachedPaths {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub struct PathCache {
    path: PathBuf,
}

impl PathCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn location(&self) -> &Path {
        &self.path
    }

    /// False for a missing, unreadable or blank file
    pub fn exists(&self) -> bool {
        let Ok(file) = File::open(&self.path) else {
            return false;
        };
        // Stops at the first line with content
        BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .any(|line| !line.trim().is_empty())
    }

    pub fn load(&self) -> Result<CachedPaths> {
        let start = Instant::now();
        let content = fs::read_to_string(&self.path)
            .map_err(|e| eyre!("Failed to read path cache {}: {}", self.path.display(), e))?;

        let mut cached = CachedPaths::default();
        let mut skipped = 0usize;
        // Label line waiting for its raw line
        let mut pending: Option<&str> = None;

        // Raw lines are recognised on their own, so a lost line costs one entry
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let Ok(path) = ArbPath::from_raw_elements(&split_fields(line)) else {
                if pending.replace(line).is_some() {
                    skipped += 1;
                    warn!("Skipping cache entry with no raw path line");
                }
                continue;
            };

            let Some(label_line) = pending.take() else {
                skipped += 1;
                warn!("Skipping raw path line with no labels: {}", line);
                continue;
            };

            match labels_for(label_line, &path) {
                Ok(readable) => {
                    cached.paths.push(path);
                    cached.readable.push(readable);
                }
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping malformed cache entry: {}", e);
                }
            }
        }

        // A trailing label line without its raw line is dropped
        if pending.is_some() {
            skipped += 1;
        }

        info!(
            "Loaded {} paths from {} in {:?} ({} skipped)",
            cached.len(),
            self.path.display(),
            start.elapsed(),
            skipped
        );
        Ok(cached)
    }

    /// `store` or `append` a whole enumeration
    pub fn save(&self, cached: &CachedPaths, append: bool) -> Result<()> {
        if append {
            self.append(&cached.paths, &cached.readable)
        } else {
            self.store(&cached.paths, &cached.readable)
        }
    }

    /// Rewrite the cache from scratch
    pub fn store(&self, paths: &[ArbPath], readable: &[Vec<String>]) -> Result<()> {
        self.write(paths, readable, false)
    }

    /// Add paths to the end of the existing cache
    pub fn append(&self, paths: &[ArbPath], readable: &[Vec<String>]) -> Result<()> {
        self.write(paths, readable, true)
    }

    fn write(&self, paths: &[ArbPath], readable: &[Vec<String>], append: bool) -> Result<()> {
        if paths.len() != readable.len() {
            return Err(eyre!(
                "{} paths but {} readable paths",
                paths.len(),
                readable.len()
            ));
        }

        let start = Instant::now();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);

        for (path, labels) in paths.iter().zip(readable) {
            writeln!(writer, "{}", terminated(labels.iter().map(|l| sanitize(l))))?;
            writeln!(writer, "{}", terminated(path.to_raw_elements().into_iter()))?;
        }
        writer.flush()?;

        info!(
            "{} {} paths to {} in {:?}",
            if append { "Appended" } else { "Wrote" },
            paths.len(),
            self.path.display(),
            start.elapsed()
        );
        Ok(())
    }
}

fn sanitize(label: &str) -> String {
    label.replace(',', ";").replace(['\n', '\r'], " ")
}

fn terminated<I: Iterator<Item = String>>(items: I) -> String {
    items.map(|item| item + ",").collect()
}

/// Comma-terminated line back into its fields
fn split_fields(line: &str) -> Vec<&str> {
    let line = line.trim_end();
    let line = line.strip_suffix(',').unwrap_or(line);
    line.split(',').collect()
}

fn labels_for(label_line: &str, path: &ArbPath) -> Result<Vec<String>> {
    let readable: Vec<String> = split_fields(label_line)
        .into_iter()
        .map(str::to_string)
        .collect();

    if readable.len() != path.hop_count() + 1 {
        return Err(eyre!(
            "{} labels for a {}-hop path",
            readable.len(),
            path.hop_count()
        ));
    }
    Ok(readable)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn sample() -> (Vec<ArbPath>, Vec<Vec<String>>) {
        let two = ArbPath::new(addr(1)).extended(500, addr(2)).extended(3000, addr(1));
        let three = ArbPath::new(addr(1))
            .extended(500, addr(2))
            .extended(100, addr(3))
            .extended(10000, addr(1));
        let labels = |n: usize| (0..n).map(|i| format!("Token {}/T{}", i, i)).collect();
        (vec![two, three], vec![labels(3), labels(4)])
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PathCache::new(dir.path().join("nested/paths.txt"));
        let (paths, readable) = sample();

        assert!(!cache.exists());
        cache.store(&paths, &readable).unwrap();
        assert!(cache.exists());

        let loaded = cache.load().unwrap();
        assert_eq!(loaded.paths, paths);
        assert_eq!(loaded.readable, readable);
    }

    #[test]
    fn test_store_truncates_append_extends() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PathCache::new(dir.path().join("paths.txt"));
        let (paths, readable) = sample();

        cache.store(&paths, &readable).unwrap();
        cache.store(&paths[..1], &readable[..1]).unwrap();
        assert_eq!(cache.load().unwrap().len(), 1);

        cache.append(&paths[1..], &readable[1..]).unwrap();
        let loaded = cache.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.paths[1], paths[1]);
    }

    #[test]
    fn test_blank_file_does_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("paths.txt");
        fs::write(&file, "  \n\n").unwrap();

        let cache = PathCache::new(&file);
        assert!(!cache.exists());
        assert!(PathCache::new(dir.path().join("missing.txt")).load().is_err());
    }

    #[test]
    fn test_commas_in_labels_are_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PathCache::new(dir.path().join("paths.txt"));
        let path = ArbPath::new(addr(1)).extended(500, addr(2)).extended(3000, addr(1));
        let labels = vec![vec![
            "Wrapped Ether/WETH".to_string(),
            "Dai, Stablecoin/DAI".to_string(),
            "Wrapped Ether/WETH".to_string(),
        ]];

        cache.store(&[path], &labels).unwrap();
        let loaded = cache.load().unwrap();
        assert_eq!(loaded.readable[0][1], "Dai; Stablecoin/DAI");
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("paths.txt");
        let (paths, readable) = sample();
        PathCache::new(&file).store(&paths, &readable).unwrap();

        let good = fs::read_to_string(&file).unwrap();
        let corrupted = format!(
            "A,B,A,\n{},notafee,{},500,{},\n{}Orphan/O,\n",
            addr(1),
            addr(2),
            addr(1),
            good
        );
        fs::write(&file, corrupted).unwrap();

        let loaded = PathCache::new(&file).load().unwrap();
        assert_eq!(loaded.paths, paths);
        assert_eq!(loaded.readable.len(), loaded.paths.len());
    }

    fn four_paths() -> (Vec<ArbPath>, Vec<Vec<String>>) {
        let paths: Vec<ArbPath> = (2..6u8)
            .map(|t| ArbPath::new(addr(1)).extended(500, addr(t)).extended(3000, addr(1)))
            .collect();
        let readable = (2..6u8)
            .map(|t| vec!["W/W".to_string(), format!("T{}/T{}", t, t), "W/W".to_string()])
            .collect();
        (paths, readable)
    }

    fn without_line(file: &Path, index: usize) {
        let content = fs::read_to_string(file).unwrap();
        let kept: Vec<&str> = content
            .lines()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, l)| l)
            .collect();
        fs::write(file, kept.join("\n") + "\n").unwrap();
    }

    #[test]
    fn test_missing_raw_line_loses_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("paths.txt");
        let (paths, readable) = four_paths();
        PathCache::new(&file).store(&paths, &readable).unwrap();

        // Raw line of the second entry
        without_line(&file, 3);

        let loaded = PathCache::new(&file).load().unwrap();
        let expected = vec![paths[0].clone(), paths[2].clone(), paths[3].clone()];
        assert_eq!(loaded.paths, expected);
        assert_eq!(loaded.readable, vec![readable[0].clone(), readable[2].clone(), readable[3].clone()]);
    }

    #[test]
    fn test_missing_first_raw_and_label_lines() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("paths.txt");
        let (paths, readable) = four_paths();
        PathCache::new(&file).store(&paths, &readable).unwrap();

        without_line(&file, 1);
        assert_eq!(PathCache::new(&file).load().unwrap().paths, paths[1..].to_vec());

        // Label line of the last entry
        PathCache::new(&file).store(&paths, &readable).unwrap();
        without_line(&file, 6);
        assert_eq!(PathCache::new(&file).load().unwrap().paths, paths[..3].to_vec());
    }

    #[test]
    fn test_exists_skips_leading_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("paths.txt");
        fs::write(&file, "\n   \nW/W,T/T,W/W,\n").unwrap();
        assert!(PathCache::new(&file).exists());
    }

    #[test]
    fn test_save_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let (paths, readable) = sample();
        let cached = CachedPaths { paths, readable };
        let cache = PathCache::new(blocker.join("paths.txt"));
        assert!(cache.save(&cached, false).is_err());
        assert!(cache.save(&cached, true).is_err());

        let cache = PathCache::new(dir.path().join("paths.txt"));
        cache.save(&cached, false).unwrap();
        cache.save(&cached, true).unwrap();
        assert_eq!(cache.load().unwrap().len(), 4);
    }
}
