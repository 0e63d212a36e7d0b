// src/provenance.rs

//! Provenance metadata embedded into package descriptions
//!
//! Every package this tool installs carries a block at the end of its
//! `Description` recording which pull request and CI job produced it:
//!
//! ```text
//! <original description text>
//! The following information is added by pr-test
//! =begin
//! PR_URL=https://github.com/linuxdeepin/dde-dock/pull/7
//! ...
//! =end
//! ```
//!
//! The block is written once at mutation time and read back later from the
//! installed package's rendered description (`dpkg-query`), where every line
//! gains leading whitespace; decoding strips only that indent.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, Local, SecondsFormat, Timelike};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;

/// First line of a provenance block
pub const BLOCK_BEGIN: &str = "=begin";

/// Last line of a provenance block
pub const BLOCK_END: &str = "=end";

/// Leading text of the line announcing the block
pub const HEADER_PREFIX: &str = "The following information is added by";

/// Keys that may appear inside a provenance block, in encoding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvenanceKey {
    Depends,
    PrUrl,
    PrRepo,
    PrNum,
    PrUser,
    PrTitle,
    PrState,
    CiUrl,
    DebUrl,
    DebModifyTime,
}

/// Identifies a pull request within the configured organization
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PullRequestId {
    pub repo: String,
    pub num: u64,
}

impl PullRequestId {
    pub fn new(repo: impl Into<String>, num: u64) -> Self {
        Self { repo: repo.into(), num }
    }
}

impl fmt::Display for PullRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.num)
    }
}

/// What the pull request lookup tells us about a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestDetail {
    pub id: PullRequestId,
    pub url: String,
    pub user: String,
    pub title: String,
    pub state: String,
}

/// Provenance of one mutated package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceRecord {
    /// `Depends` before any version rewrite, present only when rewritten
    pub depends: Option<String>,
    pub pr_url: String,
    pub pr_repo: String,
    pub pr_num: u64,
    pub pr_user: String,
    pub pr_title: String,
    pub pr_state: String,
    pub ci_url: String,
    pub deb_url: String,
    pub deb_modify_time: DateTime<FixedOffset>,
}

impl ProvenanceRecord {
    /// Build a record for a package downloaded from `deb_url`, stamped now
    pub fn new(pull_request: &PullRequestDetail, ci_url: &str, deb_url: &str) -> Self {
        // Encoded with whole seconds
        let now = Local::now().fixed_offset();
        let deb_modify_time = now.with_nanosecond(0).unwrap_or(now);

        Self {
            depends: None,
            pr_url: pull_request.url.clone(),
            pr_repo: pull_request.id.repo.clone(),
            pr_num: pull_request.id.num,
            pr_user: pull_request.user.clone(),
            pr_title: pull_request.title.clone(),
            pr_state: pull_request.state.clone(),
            ci_url: ci_url.to_string(),
            deb_url: deb_url.to_string(),
            deb_modify_time,
        }
    }

    fn value(&self, key: ProvenanceKey) -> Option<String> {
        match key {
            ProvenanceKey::Depends => self.depends.clone(),
            ProvenanceKey::PrUrl => Some(self.pr_url.clone()),
            ProvenanceKey::PrRepo => Some(self.pr_repo.clone()),
            ProvenanceKey::PrNum => Some(self.pr_num.to_string()),
            ProvenanceKey::PrUser => Some(self.pr_user.clone()),
            ProvenanceKey::PrTitle => Some(self.pr_title.clone()),
            ProvenanceKey::PrState => Some(self.pr_state.clone()),
            ProvenanceKey::CiUrl => Some(self.ci_url.clone()),
            ProvenanceKey::DebUrl => Some(self.deb_url.clone()),
            ProvenanceKey::DebModifyTime => {
                Some(self.deb_modify_time.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
        }
    }

    /// Encode the `KEY=VALUE` lines between the block markers
    pub fn to_pairs(&self) -> Vec<(ProvenanceKey, String)> {
        ProvenanceKey::iter()
            .filter_map(|key| self.value(key).map(|v| (key, single_line(&v))))
            .collect()
    }

    /// Render the full block, announced by `tool_name`, without a trailing newline
    pub fn to_block(&self, tool_name: &str) -> String {
        let mut block = format!("{} {}\n{}\n", HEADER_PREFIX, tool_name, BLOCK_BEGIN);
        for (key, value) in self.to_pairs() {
            block.push_str(&format!("{}={}\n", key, value));
        }
        block.push_str(BLOCK_END);
        block
    }

    /// Decode a record from the pairs found inside a block
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self> {
        let mut values: HashMap<ProvenanceKey, String> = HashMap::new();
        for (key, value) in pairs {
            match ProvenanceKey::from_str(key) {
                Ok(key) => {
                    values.insert(key, value.clone());
                }
                Err(_) => debug!("Ignoring unknown provenance key {}", key),
            }
        }

        let mut take = |key: ProvenanceKey| {
            values
                .remove(&key)
                .ok_or_else(|| Error::Provenance(format!("missing key {}", key)))
        };

        let depends = take(ProvenanceKey::Depends).ok();
        let pr_url = take(ProvenanceKey::PrUrl)?;
        let pr_repo = take(ProvenanceKey::PrRepo)?;
        let pr_num = take(ProvenanceKey::PrNum)?;
        let pr_user = take(ProvenanceKey::PrUser)?;
        let pr_title = take(ProvenanceKey::PrTitle)?;
        let pr_state = take(ProvenanceKey::PrState)?;
        let ci_url = take(ProvenanceKey::CiUrl)?;
        let deb_url = take(ProvenanceKey::DebUrl)?;
        let deb_modify_time = take(ProvenanceKey::DebModifyTime)?;

        Ok(Self {
            depends,
            pr_url,
            pr_repo,
            pr_num: pr_num
                .parse()
                .map_err(|_| Error::Provenance(format!("PR_NUM is not a number: {}", pr_num)))?,
            pr_user,
            pr_title,
            pr_state,
            ci_url,
            deb_url,
            deb_modify_time: DateTime::parse_from_rfc3339(&deb_modify_time).map_err(|e| {
                Error::Provenance(format!("DEB_MODIFY_TIME {:?}: {}", deb_modify_time, e))
            })?,
        })
    }

    /// Find and decode the block inside a rendered description
    ///
    /// `Ok(None)` means the text carries no block at all.
    pub fn extract(text: &str) -> Result<Option<Self>> {
        match extract_pairs(text) {
            Some(pairs) => Self::from_pairs(&pairs).map(Some),
            None => Ok(None),
        }
    }
}

fn single_line(value: &str) -> String {
    if value.contains(['\n', '\r']) {
        value
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        value.to_string()
    }
}

/// A provenance block found at the end of a description
struct BlockSpan<'a> {
    /// Byte offset of the announcing line
    start: usize,
    /// Lines between the markers, as they appear in the text
    body: Vec<&'a str>,
}

/// Locate the block this tool appends
///
/// The block counts only when the announcing line sits directly above
/// `=begin` and `=end` is the last non-blank line. Marker lines elsewhere
/// in a description belong to the package.
fn locate_block(text: &str) -> Option<BlockSpan<'_>> {
    let mut lines: Vec<(usize, &str)> = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        lines.push((offset, line.trim_end_matches(['\n', '\r'])));
        offset += line.len();
    }

    while lines.last().is_some_and(|(_, line)| line.trim().is_empty()) {
        lines.pop();
    }
    let (_, last) = lines.pop()?;
    if last.trim() != BLOCK_END {
        return None;
    }

    // Block values never form a bare `=begin` line
    let begin = lines.iter().rposition(|(_, line)| line.trim() == BLOCK_BEGIN)?;
    let (start, header) = *lines.get(begin.checked_sub(1)?)?;
    if !header.trim().starts_with(HEADER_PREFIX) {
        return None;
    }

    Some(BlockSpan {
        start,
        body: lines[begin + 1..].iter().map(|(_, line)| *line).collect(),
    })
}

/// Pull the raw `KEY=VALUE` pairs out of the trailing provenance block
///
/// Only the continuation indent is removed from each line, so values keep
/// their own whitespace. Lines without `=` are skipped. Returns `None` when
/// the text does not end with a block.
pub fn extract_pairs(text: &str) -> Option<Vec<(String, String)>> {
    let block = locate_block(text)?;

    let pairs = block
        .body
        .iter()
        .filter_map(|line| line.trim_start().split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    Some(pairs)
}

/// Remove a previously embedded block (and its announcing line) from a description
pub fn strip_block(description: &str) -> &str {
    match locate_block(description) {
        Some(block) => description[..block.start].trim_end_matches(['\n', '\r']),
        None => description,
    }
}
