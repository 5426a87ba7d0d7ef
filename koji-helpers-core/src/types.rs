//! Domain types shared by change sources, pipelines and the monitor loop.
//!
//! A [`ChangeSnapshot`] maps each affected [`SubjectKey`] (a Koji tag or a
//! repository metadata URL) to the [`Evidence`] that it changed. Two snapshots
//! are equal iff they have the same keys and the same evidence per key; that
//! equality is all the quiescence tracker ever looks at.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// The unit of change tracked within one snapshot: a tag name or a URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectKey(pub String);

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SubjectKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubjectKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Evidence
// ---------------------------------------------------------------------------

/// Builds and the users who moved them, for one direction of tag traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSet {
    #[serde(default)]
    pub builds: BTreeSet<String>,
    #[serde(default)]
    pub users: BTreeSet<String>,
}

impl BuildSet {
    pub fn is_empty(&self) -> bool {
        self.builds.is_empty() && self.users.is_empty()
    }

    pub fn record(&mut self, build: impl Into<String>, user: impl Into<String>) {
        self.builds.insert(build.into());
        self.users.insert(user.into());
    }
}

/// Tag history evidence: what arrived in and departed from one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagActivity {
    #[serde(default)]
    pub arriving: BuildSet,
    #[serde(default)]
    pub departing: BuildSet,
}

/// HTTP metadata evidence for one repository URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub etag: String,
    pub last_modified: String,
}

/// Opaque, comparable proof that a subject changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    Tagging(TagActivity),
    Fingerprint(Fingerprint),
}

impl Evidence {
    pub fn as_tagging(&self) -> Option<&TagActivity> {
        match self {
            Evidence::Tagging(activity) => Some(activity),
            Evidence::Fingerprint(_) => None,
        }
    }

    pub fn as_fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Evidence::Fingerprint(fp) => Some(fp),
            Evidence::Tagging(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ChangeSnapshot
// ---------------------------------------------------------------------------

/// Subject → evidence for one poll cycle. Ordered so that equality, logging
/// and persisted output are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSnapshot(BTreeMap<SubjectKey, Evidence>);

impl ChangeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn insert(&mut self, subject: SubjectKey, evidence: Evidence) -> Option<Evidence> {
        self.0.insert(subject, evidence)
    }

    pub fn get(&self, subject: &SubjectKey) -> Option<&Evidence> {
        self.0.get(subject)
    }

    pub fn contains(&self, subject: &SubjectKey) -> bool {
        self.0.contains_key(subject)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SubjectKey, &Evidence)> {
        self.0.iter()
    }

    pub fn subjects(&self) -> impl Iterator<Item = &SubjectKey> {
        self.0.keys()
    }

    /// Overlay `other` onto `self`; subjects present in both take `other`'s
    /// evidence, subjects only in `self` are kept.
    pub fn merge(&mut self, other: ChangeSnapshot) {
        self.0.extend(other.0);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Comma-separated subject list for log lines.
    pub fn subject_list(&self) -> String {
        self.0
            .keys()
            .map(|k| k.0.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<BTreeMap<SubjectKey, Evidence>> for ChangeSnapshot {
    fn from(map: BTreeMap<SubjectKey, Evidence>) -> Self {
        Self(map)
    }
}

impl FromIterator<(SubjectKey, Evidence)> for ChangeSnapshot {
    fn from_iter<I: IntoIterator<Item = (SubjectKey, Evidence)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ChangeSnapshot {
    type Item = (SubjectKey, Evidence);
    type IntoIter = std::collections::btree_map::IntoIter<SubjectKey, Evidence>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSnapshot {
    type Item = (&'a SubjectKey, &'a Evidence);
    type IntoIter = std::collections::btree_map::Iter<'a, SubjectKey, Evidence>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Watermark
// ---------------------------------------------------------------------------

/// Wire format understood by `koji list-history --after/--before`.
///
/// Local time: the Koji CLI does not accept UTC offsets.
pub const WATERMARK_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Time boundary up to which changes have been processed. Also used for the
/// per-cycle mark that becomes the next watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(pub NaiveDateTime);

impl Watermark {
    pub fn now() -> Self {
        Self(Local::now().naive_local())
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(WATERMARK_FORMAT))
    }
}

impl FromStr for Watermark {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
            .map(Self)
    }
}

impl Serialize for Watermark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Watermark {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tagging(builds: &[&str]) -> Evidence {
        let mut activity = TagActivity::default();
        for b in builds {
            activity.arriving.record(*b, "jdoe");
        }
        Evidence::Tagging(activity)
    }

    #[test]
    fn snapshot_equality_is_keys_and_evidence() {
        let a: ChangeSnapshot = [(SubjectKey::from("f38"), tagging(&["foo-1.0-1"]))]
            .into_iter()
            .collect();
        let same = a.clone();
        let more: ChangeSnapshot = [(SubjectKey::from("f38"), tagging(&["foo-1.0-1", "bar-2-1"]))]
            .into_iter()
            .collect();
        let other_key: ChangeSnapshot = [(SubjectKey::from("f39"), tagging(&["foo-1.0-1"]))]
            .into_iter()
            .collect();

        assert_eq!(a, same);
        assert_ne!(a, more);
        assert_ne!(a, other_key);
    }

    #[test]
    fn merge_overlays_newer_evidence() {
        let fp = |etag: &str| {
            Evidence::Fingerprint(Fingerprint {
                etag: etag.to_string(),
                last_modified: "Mon, 01 May 2017 12:00:00 GMT".to_string(),
            })
        };
        let mut base: ChangeSnapshot = [
            (SubjectKey::from("http://a/repomd.xml"), fp("1")),
            (SubjectKey::from("http://b/repomd.xml"), fp("1")),
        ]
        .into_iter()
        .collect();
        let present: ChangeSnapshot = [(SubjectKey::from("http://a/repomd.xml"), fp("2"))]
            .into_iter()
            .collect();

        base.merge(present);
        assert_eq!(base.len(), 2);
        assert_eq!(base.get(&SubjectKey::from("http://a/repomd.xml")), Some(&fp("2")));
        assert_eq!(base.get(&SubjectKey::from("http://b/repomd.xml")), Some(&fp("1")));
    }

    #[test]
    fn watermark_display_matches_koji_cli_format() {
        let dt = NaiveDate::from_ymd_opt(2017, 5, 1)
            .unwrap()
            .and_hms_micro_opt(12, 34, 56, 789)
            .unwrap();
        assert_eq!(Watermark(dt).to_string(), "2017-05-01 12:34:56.000789");
    }

    #[test]
    fn watermark_parses_with_and_without_fraction() {
        let with: Watermark = "2017-05-01 12:34:56.123456".parse().expect("fraction");
        let without: Watermark = "2017-05-01 12:34:56".parse().expect("no fraction");
        let iso: Watermark = "2017-05-01T12:34:56".parse().expect("iso");
        assert!(with > without);
        assert_eq!(without, iso);
        assert!("yesterday".parse::<Watermark>().is_err());
    }

    #[test]
    fn snapshot_serializes_as_plain_map() {
        let snap: ChangeSnapshot = [(SubjectKey::from("f38"), tagging(&["foo-1.0-1"]))]
            .into_iter()
            .collect();
        let json = serde_json::to_value(&snap).expect("serialize");
        assert!(json["f38"]["tagging"]["arriving"]["builds"].is_array());
        let back: ChangeSnapshot = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, snap);
    }

    #[test]
    fn subject_list_is_sorted() {
        let snap: ChangeSnapshot = [
            (SubjectKey::from("f39"), tagging(&["a"])),
            (SubjectKey::from("f38"), tagging(&["b"])),
        ]
        .into_iter()
        .collect();
        assert_eq!(snap.subject_list(), "f38, f39");
    }
}
