//! Text parsers for Koji CLI output.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use koji_helpers_core::{ChangeSnapshot, Evidence, SubjectKey, TagActivity};

const TAGGED_PATTERN: &str = r"^(?P<time>.*\d{4}) (?P<build>\S+) (?P<direction>tagged into|untagged from) (?P<tag>\S+) by (?P<user>\S+).*$";
const CREATED_TASK_PATTERN: &str = r"(?m)Created task: *(\d+)";
const STATE_PATTERN: &str = r"(?m)State: *(\S+)";

static TAGGED_RE: OnceLock<Option<Regex>> = OnceLock::new();
static CREATED_TASK_RE: OnceLock<Option<Regex>> = OnceLock::new();
static STATE_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Compile `pattern` once. A pattern that fails to compile is logged and
/// every parse relying on it finds nothing.
fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::error!(pattern, error = %err, "invalid parser pattern");
            None
        }
    })
    .as_ref()
}

fn tagged_re() -> Option<&'static Regex> {
    compiled(&TAGGED_RE, TAGGED_PATTERN)
}

fn created_task_re() -> Option<&'static Regex> {
    compiled(&CREATED_TASK_RE, CREATED_TASK_PATTERN)
}

fn state_re() -> Option<&'static Regex> {
    compiled(&STATE_RE, STATE_PATTERN)
}

/// Direction of one tag operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Into,
    OutOf,
}

/// One tag operation from `koji list-history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEvent {
    pub time: String,
    pub build: String,
    pub direction: Direction,
    pub tag: String,
    pub user: String,
}

/// Parse one `list-history` line; non-tag events yield `None`.
pub fn tag_event(line: &str) -> Option<TagEvent> {
    let caps = tagged_re()?.captures(line)?;
    let direction = if caps["direction"].contains("into") {
        Direction::Into
    } else {
        Direction::OutOf
    };
    Some(TagEvent {
        time: caps["time"].to_string(),
        build: caps["build"].to_string(),
        direction,
        tag: caps["tag"].to_string(),
        user: caps["user"].to_string(),
    })
}

/// Fold `list-history` output into one [`TagActivity`] per affected tag,
/// dropping tags listed in `exclude_tags`.
pub fn tag_changes(history: &str, exclude_tags: &[String]) -> ChangeSnapshot {
    let mut snapshot = ChangeSnapshot::new();
    for event in history.lines().filter_map(tag_event) {
        if exclude_tags.iter().any(|t| t == &event.tag) {
            continue;
        }
        tracing::debug!(
            tag = %event.tag,
            build = %event.build,
            direction = ?event.direction,
            user = %event.user,
            time = %event.time,
            "tag affected by build",
        );
        let key = SubjectKey::from(event.tag.as_str());
        let mut activity = snapshot
            .get(&key)
            .and_then(Evidence::as_tagging)
            .cloned()
            .unwrap_or_else(TagActivity::default);
        match event.direction {
            Direction::Into => activity.arriving.record(event.build, event.user),
            Direction::OutOf => activity.departing.record(event.build, event.user),
        }
        snapshot.insert(key, Evidence::Tagging(activity));
    }
    snapshot
}

/// Task id from `koji regen-repo` / `dist-repo` output.
pub fn created_task(output: &str) -> Option<String> {
    created_task_re()?
        .captures(output)
        .map(|caps| caps[1].to_string())
}

/// Task state from `koji taskinfo` output.
pub fn task_state(output: &str) -> Option<String> {
    state_re()?.captures(output).map(|caps| caps[1].to_string())
}

/// RPM file names listed after the `RPMs:` header of `koji buildinfo`.
///
/// Lines look like `/mnt/koji/packages/foo/1.0/1/x86_64/foo-1.0-1.x86_64.rpm\tSignatures: …`;
/// only the base name is kept.
pub fn buildinfo_rpms(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("RPMs:"))
        .skip(1)
        .filter_map(rpm_basename)
        .collect()
}

/// RPM file names from `koji list-signed` output.
pub fn signed_rpms(output: &str) -> BTreeSet<String> {
    output.lines().filter_map(rpm_basename).collect()
}

fn rpm_basename(line: &str) -> Option<String> {
    let path = line.split_whitespace().next()?;
    if !path.ends_with(".rpm") {
        return None;
    }
    path.rsplit('/').next().map(str::to_string)
}
