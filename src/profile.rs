//! Profile facade (spec §4.8, §6): per-gene HMM metadata, a cached search
//! primitive behind the `HmmSearchRunner` trait boundary, the HMMER3 text
//! parser, gembase replicon-name extraction, and the persisted-TSV format.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use regex::Regex;

use crate::common::io::open_read_maybe_gz;
use crate::err::MacsyError;
use crate::hit::CoreHit;
use crate::model::gene::CoreGene;

/// `length` and `GA`-threshold metadata read from an HMMER3 profile file
/// header (spec §4.8: "length and whether a GA bit-threshold is declared").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile {
    pub length: u32,
    pub ga_threshold: Option<f64>,
}

impl Profile {
    /// Parse the `LENG` and `GA` lines of an HMMER3 profile's header.
    /// Accepts plain or `.gz` files transparently (spec §6).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let reader = open_read_maybe_gz(path.as_ref())?;
        Self::parse(reader)
    }

    fn parse(reader: impl BufRead) -> Result<Self, anyhow::Error> {
        let mut length = None;
        let mut ga_threshold = None;
        for line in reader.lines() {
            let line = line?;
            if line == "HMM" {
                // Header block ended; no LENG/GA line will follow.
                break;
            }
            if let Some(rest) = line.strip_prefix("LENG") {
                length = rest.trim().parse::<u32>().ok();
            } else if let Some(rest) = line.strip_prefix("GA") {
                // `GA    25.00 20.00;` — the first token is the bit threshold
                // used when `cut_ga` is requested; a malformed line is a
                // warning, not fatal (spec §7).
                match rest.split_whitespace().next().and_then(|tok| tok.trim_end_matches(';').parse::<f64>().ok()) {
                    Some(ga) => ga_threshold = Some(ga),
                    None => tracing::warn!("malformed GA line in profile header: {line:?}"),
                }
            }
        }
        let length = length.ok_or_else(|| anyhow::anyhow!("profile header has no LENG line"))?;
        Ok(Self { length, ga_threshold })
    }
}

/// A fully-parsed domain hit from one `>>` region of an HMMER3 `hmmsearch`
/// text report, before it is turned into a `CoreHit` (needs `gene` and
/// `replicon_name` supplied by the caller).
#[derive(Debug, Clone, PartialEq)]
pub struct RawDomainHit {
    pub hit_id: String,
    pub seq_length: u32,
    pub score: f64,
    pub i_eval: f64,
    pub hmm_from: u32,
    pub hmm_to: u32,
    pub ali_from: u32,
    pub ali_to: u32,
}

impl RawDomainHit {
    pub fn profile_coverage(&self, profile_length: u32) -> f64 {
        (self.hmm_to - self.hmm_from + 1) as f64 / profile_length as f64
    }

    pub fn sequence_coverage(&self) -> f64 {
        (self.ali_to - self.ali_from + 1) as f64 / self.seq_length as f64
    }
}

/// Thresholding policy applied after parsing (spec §6: "selected iff
/// `i_eval <= i_evalue_sel` AND `profile_coverage >= coverage_threshold`").
#[derive(Debug, Clone, Copy)]
pub struct SelectionThresholds {
    pub i_evalue_sel: f64,
    pub coverage_threshold: f64,
}

/// Line-oriented parser over HMMER3 `hmmsearch` text output, keyed on `>>`
/// hit-region markers. Each `>>` line carries the hit id and the sequence
/// length as a trailing `[L=n]` marker; the domain table rows beneath it are
/// whitespace-separated columns `dom# cond score bias c-Evalue i-Evalue
/// hmm_from hmm_to ali_from ali_to env_from env_to acc`. Malformed domain
/// lines are skipped with a warning (collected, non-fatal per §7), not a
/// parse error.
pub fn parse_hmmer3_text(text: &str) -> Vec<RawDomainHit> {
    let mut hits = Vec::new();
    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let Some(rest) = line.strip_prefix(">>") else {
            continue;
        };
        let rest = rest.trim();
        let Some(hit_id) = rest.split_whitespace().next() else {
            continue;
        };
        let hit_id = hit_id.to_owned();
        let Some(seq_length) = parse_seq_length(rest) else {
            tracing::warn!("no sequence length ([L=n]) found for hit '{hit_id}', skipping");
            continue;
        };

        while let Some(candidate) = lines.peek() {
            if candidate.starts_with(">>") {
                break;
            }
            let fields: Vec<&str> = candidate.split_whitespace().collect();
            if fields.len() < 10 || fields[0].parse::<u32>().is_err() {
                lines.next();
                continue;
            }
            let parsed = (|| -> Option<RawDomainHit> {
                let score = fields[2].parse::<f64>().ok()?;
                let i_eval = fields[5].parse::<f64>().ok()?;
                let hmm_from = fields[6].parse::<u32>().ok()?;
                let hmm_to = fields[7].parse::<u32>().ok()?;
                let ali_from = fields[8].parse::<u32>().ok()?;
                let ali_to = fields[9].parse::<u32>().ok()?;
                Some(RawDomainHit {
                    hit_id: hit_id.clone(),
                    seq_length,
                    score,
                    i_eval,
                    hmm_from,
                    hmm_to,
                    ali_from,
                    ali_to,
                })
            })();
            match parsed {
                Some(hit) => hits.push(hit),
                None => tracing::warn!("malformed domain line for hit '{hit_id}': {candidate:?}"),
            }
            lines.next();
        }
    }
    hits
}

fn parse_seq_length(line: &str) -> Option<u32> {
    // `seq_07_123  some description  [L=356]`
    let start = line.find("[L=")?;
    let rest = &line[start + 3..];
    let end = rest.find(']')?;
    rest[..end].parse::<u32>().ok()
}

/// Keep only hits clearing both thresholds (spec §6).
pub fn select_hits(hits: Vec<RawDomainHit>, profile_length: u32, thresholds: SelectionThresholds) -> Vec<RawDomainHit> {
    hits.into_iter()
        .filter(|h| h.i_eval <= thresholds.i_evalue_sel && h.profile_coverage(profile_length) >= thresholds.coverage_threshold)
        .collect()
}

/// How the input protein database names its replicons (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum DbType {
    Gembase,
    OrderedReplicon,
    Unordered,
}

/// Derive the replicon name for one hit id, per `db_type` (spec §6).
/// `gembase` ids look like `A_B_C_..._seq`; the replicon name is everything
/// before the final `_`-separated sequence number. `ordered_replicon` and
/// `unordered` DBs carry a single replicon per file, named by `db_file_stem`.
pub fn replicon_name_for_hit(hit_id: &str, db_type: DbType, db_file_stem: &str) -> String {
    match db_type {
        DbType::Gembase => {
            static GEMBASE_SEQ_SUFFIX: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
            let re = GEMBASE_SEQ_SUFFIX.get_or_init(|| Regex::new(r"^(?P<replicon>.+)_\d+$").unwrap());
            re.captures(hit_id)
                .and_then(|c| c.name("replicon"))
                .map(|m| m.as_str().to_owned())
                .unwrap_or_else(|| hit_id.to_owned())
        }
        DbType::OrderedReplicon | DbType::Unordered => db_file_stem.to_owned(),
    }
}

const TSV_HEADER: &str = "hit_id\treplicon_name\tposition_hit\thit_sequence_length\tgene_name\ti_eval\tscore\tprofile_coverage\tsequence_coverage\tbegin\tend";

/// Write hits as the TSV format of spec §6: a `#`-comment preamble (tool
/// version, model family/version, command line) followed by the header row
/// and one row per hit.
pub fn write_hits_tsv(
    path: impl AsRef<Path>,
    hits: &[CoreHit],
    tool_version: &str,
    model_family: &str,
    model_version: &str,
    command_line: &str,
) -> Result<(), anyhow::Error> {
    use std::io::Write;
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "# macsy-worker {tool_version}")?;
    writeln!(file, "# model: {model_family} {model_version}")?;
    writeln!(file, "# command: {command_line}")?;
    writeln!(file, "{TSV_HEADER}")?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(file);
    for hit in hits {
        writer.write_record([
            hit.hit_id.as_str(),
            hit.replicon_name.as_str(),
            &hit.position.to_string(),
            &hit.seq_length.to_string(),
            hit.gene.name.as_str(),
            &format!("{:.3e}", hit.i_eval),
            &format!("{:.3}", hit.score),
            &format!("{:.3}", hit.profile_coverage),
            &format!("{:.3}", hit.sequence_coverage),
            &hit.begin_match.to_string(),
            &hit.end_match.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Re-parse a TSV written by `write_hits_tsv`, skipping `#`-comment lines.
/// `family_name` is supplied by the caller since the TSV does not carry it
/// (a `CoreGene` needs both family and gene name).
pub fn read_hits_tsv(path: impl AsRef<Path>, family_name: &str) -> Result<Vec<CoreHit>, anyhow::Error> {
    let reader = open_read_maybe_gz(path.as_ref())?;
    let mut hits = Vec::new();
    let mut body = String::new();
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') {
            continue;
        }
        body.push_str(&line);
        body.push('\n');
    }
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(body.as_bytes());
    for record in csv_reader.records() {
        let record = record?;
        hits.push(CoreHit {
            gene: CoreGene {
                family_name: family_name.to_owned(),
                name: record.get(4).unwrap_or_default().to_owned(),
            },
            hit_id: record.get(0).unwrap_or_default().to_owned(),
            seq_length: record.get(3).unwrap_or_default().parse()?,
            replicon_name: record.get(1).unwrap_or_default().to_owned(),
            position: record.get(2).unwrap_or_default().parse()?,
            i_eval: record.get(5).unwrap_or_default().parse()?,
            score: record.get(6).unwrap_or_default().parse()?,
            profile_coverage: record.get(7).unwrap_or_default().parse()?,
            sequence_coverage: record.get(8).unwrap_or_default().parse()?,
            begin_match: record.get(9).unwrap_or_default().parse()?,
            end_match: record.get(10).unwrap_or_default().parse()?,
        });
    }
    Ok(hits)
}

/// Trait boundary for the external HMM search binary (spec §4.8, §5): given
/// a profile and a sequence database, produce the raw HMMER3 text report.
/// Implementations own child-process lifecycle (spawn, wait, stderr capture
/// on non-zero exit) — out of scope for the core pipeline itself.
pub trait HmmSearchRunner: Send + Sync {
    fn search(&self, profile_path: &Path, db_path: &Path, cpu: u32, ga_threshold: Option<f64>, e_value: f64) -> Result<String, MacsyError>;
}

/// Per-(gene, replicon-type) cache so multiple models sharing a profile run
/// the search once (spec §4.8). Mirrors the teacher's mutex-guarded cache
/// idiom: the first caller for a key pays the search cost; later callers
/// observe the cached report.
pub struct ProfileFactory<R: HmmSearchRunner> {
    runner: R,
    cache: Mutex<HashMap<(String, String), String>>,
}

impl<R: HmmSearchRunner> ProfileFactory<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the raw report for `gene_name` against `replicon_key` (e.g. the
    /// sequence DB path as a string), running the search at most once per
    /// key for the lifetime of this factory.
    pub fn report(
        &self,
        gene_name: &str,
        replicon_key: &str,
        profile_path: &Path,
        db_path: &Path,
        cpu: u32,
        ga_threshold: Option<f64>,
        e_value: f64,
    ) -> Result<String, MacsyError> {
        let key = (gene_name.to_owned(), replicon_key.to_owned());
        let mut cache = self.cache.lock().unwrap_or_else(|poison| poison.into_inner());
        if let Some(cached) = cache.get(&key) {
            return Ok(cached.clone());
        }
        let report = self.runner.search(profile_path, db_path, cpu, ga_threshold, e_value)?;
        cache.insert(key, report.clone());
        Ok(report)
    }
}

/// Path to a gene's profile file, preferring `.hmm` over `.hmm.gz` when both
/// exist (spec §6: "each file must contain exactly one profile").
pub fn profile_path_for_gene(profiles_dir: impl AsRef<Path>, gene_name: &str) -> Option<PathBuf> {
    let dir = profiles_dir.as_ref();
    let plain = dir.join(format!("{gene_name}.hmm"));
    if plain.is_file() {
        return Some(plain);
    }
    let gz = dir.join(format!("{gene_name}.hmm.gz"));
    if gz.is_file() {
        return Some(gz);
    }
    None
}
