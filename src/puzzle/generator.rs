//! Daily puzzle generation.
//!
//! For each date the generator picks one target line per pack. Movies are
//! chosen uniformly first and a line within the movie second, so a long script
//! does not crowd out short ones.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use serde_json::Value;

use super::rng::{daily_seed, Mulberry32};
use super::{
    daily_path, list_packs, load_pack, read_json, script_path, write_json, ConsolidatedDay,
    DailyPuzzle, DateRange, DialogueLine, Manifest, Pack, PuzzleError, PuzzleLines,
    PuzzleMetadata, Script, TargetLine, CONTEXT_AFTER, PUZZLE_VERSION,
};

/// A line in the pack-wide flattened dialogue list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatLine {
    pub character: String,
    pub text: String,
    pub movie: String,
    pub movie_id: String,
    pub original_index: usize,
}

/// All of a pack's scripts, flattened and indexed for selection.
#[derive(Debug, Clone)]
pub struct PackLines {
    pub pack: Pack,
    pub lines: Vec<FlatLine>,
    /// Candidate target indices into `lines`, per movie.
    pub candidates: BTreeMap<String, Vec<usize>>,
    pub metadata: PuzzleMetadata,
}

/// Flatten scripts in movie-id order.
pub fn flatten_lines(scripts: &BTreeMap<String, Script>) -> Vec<FlatLine> {
    let mut out = Vec::new();
    for (movie_id, script) in scripts {
        for (idx, line) in script.lines.iter().enumerate() {
            out.push(FlatLine {
                character: line.character.clone(),
                text: line.text.clone(),
                movie: script.title.clone(),
                movie_id: movie_id.clone(),
                original_index: idx,
            });
        }
    }
    out
}

/// Indices of lines spoken by a significant character with one line of
/// context before and three after, grouped by movie.
pub fn candidate_index(
    scripts: &BTreeMap<String, Script>,
    lines: &[FlatLine],
) -> BTreeMap<String, Vec<usize>> {
    let mut by_movie: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let upper = lines.len().saturating_sub(CONTEXT_AFTER);
    for (idx, line) in lines.iter().enumerate() {
        if idx < 1 || idx >= upper {
            continue;
        }
        let significant = scripts
            .get(&line.movie_id)
            .map(|s| s.significant_cast().contains(&line.character))
            .unwrap_or(false);
        if significant {
            by_movie.entry(line.movie_id.clone()).or_default().push(idx);
        }
    }
    by_movie
}

/// Choice lists for the player: movies ordered by year (undated last), then id.
pub fn build_metadata(scripts: &BTreeMap<String, Script>) -> PuzzleMetadata {
    let mut movies: Vec<&String> = scripts
        .iter()
        .filter(|(_, s)| !s.lines.is_empty())
        .map(|(id, _)| id)
        .collect();
    movies.sort_by_key(|id| {
        let year = scripts.get(*id).and_then(|s| s.year);
        (year.is_none(), year.unwrap_or(0), (*id).clone())
    });

    let mut meta = PuzzleMetadata::default();
    for (id, script) in scripts {
        if let Some(year) = script.year {
            meta.movie_years.insert(id.clone(), year);
        }
        if !script.title.is_empty() {
            meta.movie_titles.insert(id.clone(), script.title.clone());
        }
        if let Some(poster) = &script.poster {
            meta.movie_posters.insert(id.clone(), poster.clone());
        }
    }
    for id in &movies {
        let mut cast = scripts
            .get(*id)
            .map(|s| s.significant_cast().to_vec())
            .unwrap_or_default();
        cast.sort();
        meta.characters_by_movie.insert((*id).clone(), cast);
    }
    meta.movies = movies.into_iter().cloned().collect();
    meta
}

impl PackLines {
    pub fn load(data_dir: &Path, pack_id: &str) -> Result<Self, PuzzleError> {
        let pack = load_pack(data_dir, pack_id)?;
        let mut scripts = BTreeMap::new();
        for movie_id in &pack.movies {
            let script: Script = read_json(&script_path(data_dir, movie_id))?;
            scripts.insert(movie_id.clone(), script);
        }
        Ok(Self::from_scripts(pack, &scripts))
    }

    pub fn from_scripts(pack: Pack, scripts: &BTreeMap<String, Script>) -> Self {
        let lines = flatten_lines(scripts);
        let candidates = candidate_index(scripts, &lines);
        let metadata = build_metadata(scripts);
        Self {
            pack,
            lines,
            candidates,
            metadata,
        }
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.values().map(Vec::len).sum()
    }

    /// Index of the target line for `date`.
    pub fn select_target(&self, date: &str) -> Result<usize, PuzzleError> {
        let movie_ids: Vec<&String> = self
            .pack
            .movies
            .iter()
            .filter(|m| self.candidates.contains_key(*m))
            .collect();
        if movie_ids.is_empty() {
            return Err(PuzzleError::NoCandidates(self.pack.id.clone()));
        }
        let mut rng = Mulberry32::new(daily_seed(&self.pack.id, date));
        let movie = movie_ids[rng.pick(movie_ids.len())];
        let indices = &self.candidates[movie];
        let target = indices[rng.pick(indices.len())];
        debug!(
            "pack={} date={} movie={} target={}",
            self.pack.id, date, movie, target
        );
        Ok(target)
    }

    pub fn puzzle_for(&self, date: &str) -> Result<DailyPuzzle, PuzzleError> {
        let target = self.select_target(date)?;
        let line = &self.lines[target];
        let context_before = target
            .checked_sub(1)
            .map(|i| &self.lines[i])
            .map(|l| DialogueLine {
                character: l.character.clone(),
                text: l.text.clone(),
            });
        let context_after = self.lines[target + 1..]
            .iter()
            .take(CONTEXT_AFTER)
            .map(|l| DialogueLine {
                character: l.character.clone(),
                text: l.text.clone(),
            })
            .collect();
        Ok(DailyPuzzle {
            version: PUZZLE_VERSION,
            date: date.to_string(),
            pack_id: self.pack.id.clone(),
            puzzle: PuzzleLines {
                target_line: TargetLine {
                    character: line.character.clone(),
                    text: line.text.clone(),
                    movie: line.movie.clone(),
                },
                context_before,
                context_after,
            },
            metadata: self.metadata.clone(),
        })
    }
}

/// First date generated when no start is given: yesterday in UTC, so players
/// behind UTC still find their local date.
pub fn default_start() -> NaiveDate {
    Utc::now().date_naive() - Duration::days(1)
}

fn dates(start: NaiveDate, days: u32) -> impl Iterator<Item = NaiveDate> {
    (0..=i64::from(days)).map(move |offset| start + Duration::days(offset))
}

/// Writes puzzle files for packs under one data directory.
pub struct PuzzleGenerator {
    data_dir: PathBuf,
}

impl PuzzleGenerator {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Write `days + 1` daily puzzles starting at `start`, plus the manifest.
    pub fn generate_for_pack(&self, pack_id: &str, start: NaiveDate, days: u32) -> Result<Manifest> {
        let lines = PackLines::load(&self.data_dir, pack_id)
            .with_context(|| format!("loading pack '{}'", pack_id))?;
        info!(
            "pack {}: {} lines, {} candidates across {} movies",
            pack_id,
            lines.lines.len(),
            lines.candidate_count(),
            lines.metadata.movies.len()
        );

        let mut generated = 0u32;
        for date in dates(start, days) {
            let date_str = date.format("%Y-%m-%d").to_string();
            let puzzle = lines.puzzle_for(&date_str)?;
            write_json(&daily_path(&self.data_dir, pack_id, &date_str), &puzzle)?;
            generated += 1;
            if generated % 30 == 0 {
                debug!("pack {}: {}/{} puzzles written", pack_id, generated, days + 1);
            }
        }

        let end = start + Duration::days(i64::from(days));
        let manifest = Manifest {
            pack_id: lines.pack.id.clone(),
            pack_name: lines.pack.name.clone(),
            generated_at: Utc::now().to_rfc3339(),
            date_range: DateRange {
                start: start.format("%Y-%m-%d").to_string(),
                end: end.format("%Y-%m-%d").to_string(),
            },
            total_puzzles: generated,
            cycle_length: lines.lines.len(),
            tier_messages: lines.pack.tier_messages.clone(),
        };
        write_json(
            &self.data_dir.join("daily").join(pack_id).join("manifest.json"),
            &manifest,
        )?;
        info!(
            "pack {}: wrote {} puzzles ({} to {})",
            pack_id, generated, manifest.date_range.start, manifest.date_range.end
        );
        Ok(manifest)
    }

    /// One file per date holding every pack's puzzle and all manifests.
    pub fn generate_consolidated(&self, start: NaiveDate, days: u32) -> Result<usize> {
        let pack_ids = list_packs(&self.data_dir)?;
        let mut manifests = BTreeMap::new();
        for pack_id in &pack_ids {
            let path = self.data_dir.join("daily").join(pack_id).join("manifest.json");
            if path.exists() {
                manifests.insert(pack_id.clone(), read_json::<Manifest>(&path)?);
            }
        }

        let out_dir = self.data_dir.join("daily-all");
        let mut written = 0;
        for date in dates(start, days) {
            let date_str = date.format("%Y-%m-%d").to_string();
            let mut puzzles = BTreeMap::new();
            for pack_id in &pack_ids {
                let path = daily_path(&self.data_dir, pack_id, &date_str);
                if path.exists() {
                    puzzles.insert(pack_id.clone(), read_json::<DailyPuzzle>(&path)?);
                }
            }
            let day = ConsolidatedDay {
                date: date_str.clone(),
                puzzles,
                manifests: manifests.clone(),
            };
            let path = out_dir.join(format!("{}.json", date_str));
            std::fs::create_dir_all(&out_dir)?;
            std::fs::write(&path, serde_json::to_string(&day)?)
                .with_context(|| format!("writing {}", path.display()))?;
            written += 1;
        }
        info!("wrote {} consolidated daily files to {}", written, out_dir.display());
        Ok(written)
    }

    /// Theme map keyed by pack id, each theme extended with the pack name and
    /// movie count.
    pub fn collect_themes(&self) -> Result<BTreeMap<String, Value>> {
        let mut themes = BTreeMap::new();
        for pack_id in list_packs(&self.data_dir)? {
            let pack = match load_pack(&self.data_dir, &pack_id) {
                Ok(pack) => pack,
                Err(e) => {
                    warn!("skipping theme for {}: {}", pack_id, e);
                    continue;
                }
            };
            let Some(theme) = &pack.theme else {
                continue;
            };
            let mut value = serde_json::to_value(theme)?;
            if let Value::Object(map) = &mut value {
                map.insert("name".to_string(), Value::String(pack.name.clone()));
                map.insert("movieCount".to_string(), Value::from(pack.movies.len()));
            }
            themes.insert(pack_id, value);
        }
        Ok(themes)
    }

    /// Write the themes script the webview loads before rendering.
    pub fn generate_themes(&self, out_file: &Path) -> Result<usize> {
        let themes = self.collect_themes()?;
        let mut js = String::from("// Auto-generated theme data - DO NOT EDIT\n");
        js.push_str("// Regenerate with `scriptle generate`\n\n");
        js.push_str("window.SCRIPTLE_THEMES = ");
        js.push_str(&serde_json::to_string_pretty(&themes)?);
        js.push_str(";\n");
        if let Some(parent) = out_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(out_file, js).with_context(|| format!("writing {}", out_file.display()))?;
        info!("wrote {} theme(s) to {}", themes.len(), out_file.display());
        Ok(themes.len())
    }

    /// Every pack, then the themes file, then the consolidated files.
    pub fn generate_all(&self, start: NaiveDate, days: u32, themes_file: &Path) -> Result<Vec<Manifest>> {
        let pack_ids = list_packs(&self.data_dir)?;
        info!("found {} pack(s)", pack_ids.len());
        let mut manifests = Vec::with_capacity(pack_ids.len());
        for pack_id in &pack_ids {
            manifests.push(self.generate_for_pack(pack_id, start, days)?);
        }
        self.generate_themes(themes_file)?;
        self.generate_consolidated(start, days)?;
        Ok(manifests)
    }
}
