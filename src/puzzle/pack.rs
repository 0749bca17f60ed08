//! Pack maintenance: creating/updating pack definitions and checking how well
//! each significant character is represented among selectable lines.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use super::generator::{flatten_lines, FlatLine};
use super::{
    load_pack, pack_path, read_json, script_path, write_json, Pack, PackType, Script, Theme,
    CONTEXT_AFTER,
};
use crate::game::TierMessages;

/// Outcome of [`create_or_update_pack`].
#[derive(Debug, Clone, PartialEq)]
pub struct PackUpdate {
    pub pack: Pack,
    pub created: bool,
    pub copied_scripts: Vec<String>,
    pub missing_scripts: Vec<String>,
    /// Copied scripts that had no cast list and got a derived one.
    pub derived_casts: Vec<String>,
}

/// Create a pack with the default theme and tier messages, or replace the movie
/// list of an existing one. When `source_dir` is given, `<movie>.json` files are
/// copied from it into the scripts directory first.
pub fn create_or_update_pack(
    data_dir: &Path,
    pack_id: &str,
    name: &str,
    pack_type: PackType,
    movie_ids: &[String],
    source_dir: Option<&Path>,
) -> Result<PackUpdate> {
    if movie_ids.is_empty() {
        bail!("a pack needs at least one movie");
    }

    let mut copied_scripts = Vec::new();
    let mut missing_scripts = Vec::new();
    let mut derived_casts = Vec::new();
    if let Some(source) = source_dir {
        let dest_dir = data_dir.join("scripts");
        std::fs::create_dir_all(&dest_dir)?;
        for movie_id in movie_ids {
            let from = source.join(format!("{}.json", movie_id));
            if !from.exists() {
                warn!("source script not found: {}", from.display());
                missing_scripts.push(movie_id.clone());
                continue;
            }
            let dest = script_path(data_dir, movie_id);
            std::fs::copy(&from, &dest)?;
            if fill_speaking_cast(&dest, false)?.is_some() {
                derived_casts.push(movie_id.clone());
            }
            copied_scripts.push(movie_id.clone());
        }
    }

    let path = pack_path(data_dir, pack_id);
    let (pack, created) = if path.exists() {
        let mut pack = load_pack(data_dir, pack_id)?;
        pack.movies = movie_ids.to_vec();
        info!("updating pack {} ({} movies)", pack_id, pack.movies.len());
        (pack, false)
    } else {
        info!("creating pack {} ({} movies)", pack_id, movie_ids.len());
        let pack = Pack {
            id: pack_id.to_string(),
            name: name.to_string(),
            pack_type,
            movies: movie_ids.to_vec(),
            theme: Some(Theme::default()),
            tier_messages: Some(TierMessages::default()),
        };
        (pack, true)
    };
    write_json(&path, &pack)?;

    Ok(PackUpdate {
        pack,
        created,
        copied_scripts,
        missing_scripts,
        derived_casts,
    })
}

/// Write a derived `topSpeakingCast` into a script file. Scripts that already
/// name a cast are left alone unless `overwrite` is set. Other keys in the
/// file are preserved. Returns the new list when the file was rewritten.
pub fn fill_speaking_cast(path: &Path, overwrite: bool) -> Result<Option<Vec<String>>> {
    let mut raw: serde_json::Value = read_json(path)?;
    let script: Script = serde_json::from_value(raw.clone())
        .with_context(|| format!("parsing script {}", path.display()))?;
    if !overwrite && !script.significant_cast().is_empty() {
        return Ok(None);
    }
    let cast = script.derive_speaking_cast();
    let Some(object) = raw.as_object_mut() else {
        bail!("script {} is not a JSON object", path.display());
    };
    object.insert("topSpeakingCast".to_string(), serde_json::json!(cast));
    write_json(path, &raw)?;
    info!(
        "derived speaking cast for {} ({} characters from {} lines)",
        path.display(),
        cast.len(),
        script.lines.len()
    );
    Ok(Some(cast))
}

/// Derive speaking casts for every script in a pack. Missing scripts are
/// skipped with a warning. Returns `(movie id, cast)` for rewritten files.
pub fn refresh_speaking_casts(
    data_dir: &Path,
    pack_id: &str,
    overwrite: bool,
) -> Result<Vec<(String, Vec<String>)>> {
    let pack = load_pack(data_dir, pack_id)?;
    let mut updated = Vec::new();
    for movie_id in &pack.movies {
        let path = script_path(data_dir, movie_id);
        if !path.exists() {
            warn!("script not found: {}", path.display());
            continue;
        }
        if let Some(cast) = fill_speaking_cast(&path, overwrite)? {
            updated.push((movie_id.clone(), cast));
        }
    }
    Ok(updated)
}

/// A character keeping less than this share of its lines is flagged.
const SEVERE_RETAINED_RATIO: f64 = 0.3;

/// Selectable-line counts for one pack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageReport {
    pub pack_id: String,
    pub significant: BTreeSet<String>,
    /// Eligible lines per character with no word filter.
    pub baseline: BTreeMap<String, usize>,
    /// Eligible lines per character with the word filter applied.
    pub filtered: BTreeMap<String, usize>,
    pub min_words: usize,
    pub missing_scripts: Vec<String>,
}

impl CoverageReport {
    fn counts(&self, character: &str) -> (usize, usize) {
        (
            self.baseline.get(character).copied().unwrap_or(0),
            self.filtered.get(character).copied().unwrap_or(0),
        )
    }

    /// Significant characters that had eligible lines but lose all of them
    /// once the filter applies.
    pub fn lost_characters(&self) -> Vec<&str> {
        self.significant
            .iter()
            .filter(|c| matches!(self.counts(c), (before, 0) if before > 0))
            .map(String::as_str)
            .collect()
    }

    /// Characters that keep some lines but fewer than 30% of their baseline,
    /// with `(before, after)` counts.
    pub fn severely_reduced(&self) -> Vec<(&str, usize, usize)> {
        self.significant
            .iter()
            .filter_map(|c| {
                let (before, after) = self.counts(c);
                (after > 0 && (after as f64) < before as f64 * SEVERE_RETAINED_RATIO)
                    .then_some((c.as_str(), before, after))
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "Pack: {}\nSignificant characters: {}\n",
            self.pack_id,
            self.significant.len()
        );
        if !self.missing_scripts.is_empty() {
            out.push_str(&format!(
                "Missing scripts: {}\n",
                self.missing_scripts.join(", ")
            ));
        }
        out.push_str(&format!(
            "{:<28} {:>8} {:>8}\n",
            "Character",
            "all",
            format!(">={}w", self.min_words)
        ));
        for character in &self.significant {
            out.push_str(&format!(
                "{:<28} {:>8} {:>8}\n",
                character,
                self.baseline.get(character).copied().unwrap_or(0),
                self.filtered.get(character).copied().unwrap_or(0)
            ));
        }
        let lost = self.lost_characters();
        if !lost.is_empty() {
            out.push_str(&format!("Lost under filter: {}\n", lost.join(", ")));
        }
        let reduced = self.severely_reduced();
        if !reduced.is_empty() {
            out.push_str("Severely reduced:\n");
            for (character, before, after) in reduced {
                out.push_str(&format!("  {}: {} -> {} lines\n", character, before, after));
            }
        }
        out
    }
}

fn eligible_counts(
    lines: &[FlatLine],
    significant: &BTreeSet<String>,
    min_words: usize,
) -> BTreeMap<String, usize> {
    let upper = lines.len().saturating_sub(CONTEXT_AFTER);
    let mut counts = BTreeMap::new();
    for (idx, line) in lines.iter().enumerate() {
        if idx < 1 || idx >= upper || !significant.contains(&line.character) {
            continue;
        }
        if line.text.split_whitespace().count() >= min_words {
            *counts.entry(line.character.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Count selectable lines per significant character, with and without a
/// minimum word count. Missing scripts are reported, not fatal.
pub fn coverage(data_dir: &Path, pack_id: &str, min_words: usize) -> Result<CoverageReport> {
    let pack = load_pack(data_dir, pack_id)?;
    let mut scripts = BTreeMap::new();
    let mut missing_scripts = Vec::new();
    for movie_id in &pack.movies {
        let path = script_path(data_dir, movie_id);
        if !path.exists() {
            missing_scripts.push(movie_id.clone());
            continue;
        }
        let script: Script = read_json(&path)?;
        scripts.insert(movie_id.clone(), script);
    }

    let lines = flatten_lines(&scripts);
    let significant: BTreeSet<String> = scripts
        .values()
        .flat_map(|s| s.significant_cast().iter().cloned())
        .collect();

    Ok(CoverageReport {
        pack_id: pack.id,
        baseline: eligible_counts(&lines, &significant, 0),
        filtered: eligible_counts(&lines, &significant, min_words),
        significant,
        min_words,
        missing_scripts,
    })
}
