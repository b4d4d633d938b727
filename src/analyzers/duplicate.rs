use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::audio::metadata::TagExtractor;
use crate::naming::destination::DestinationKey;
use crate::naming::normalize::fuzzy_key;
use crate::utils::file_ops::collect_files;
use crate::{ConvertError, Result};

/// Source files grouped by the fuzzy title+artist key.
#[derive(Debug, Default)]
pub struct DuplicateGroups {
    pub groups: BTreeMap<String, Vec<PathBuf>>,
    pub files_scanned: usize,
    pub files_skipped: usize,
}

impl DuplicateGroups {
    pub fn insert(&mut self, key: String, path: PathBuf) {
        self.groups.entry(key).or_default().push(path);
    }

    /// Groups with at least two members.
    pub fn interesting(&self) -> impl Iterator<Item = (&String, &Vec<PathBuf>)> {
        self.groups.iter().filter(|(_, members)| members.len() >= 2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MemberReport {
    Resolved {
        source: PathBuf,
        destination: PathBuf,
        suggestion: String,
    },
    /// The second tag read failed; the file is listed without advice.
    Skipped { source: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub key: String,
    pub members: Vec<MemberReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub groups: Vec<GroupReport>,
}

/// Finds likely duplicate tracks in a tree and suggests what to remove.
/// It never modifies anything: suggestions are shell commands for a human
/// to review.
pub struct DuplicateFinder {
    extractor: TagExtractor,
}

impl DuplicateFinder {
    pub fn new(extractor: TagExtractor) -> Self {
        Self { extractor }
    }

    pub fn group_files(&mut self, root: impl AsRef<Path>, verbose: bool) -> Result<DuplicateGroups> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ConvertError::NotFound(root.to_path_buf()));
        }

        let mut groups = DuplicateGroups::default();
        for path in collect_files(root) {
            groups.files_scanned += 1;
            match self.extractor.extract_tags(&path, verbose) {
                Ok(tags) => {
                    let key = fuzzy_key(tags.title(), tags.artist());
                    debug!("{} -> {:?}", path.display(), key);
                    groups.insert(key, path);
                }
                Err(e) if e.is_tag_failure() => {
                    warn!("Skipping {}: {}", path.display(), e);
                    groups.files_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            "Grouped {} files into {} keys",
            groups.files_scanned - groups.files_skipped,
            groups.groups.len()
        );
        Ok(groups)
    }

    pub fn find_duplicates(
        &mut self,
        root: impl AsRef<Path>,
        dest_root: impl AsRef<Path>,
        quarantine: Option<&Path>,
        verbose: bool,
    ) -> Result<DuplicateReport> {
        let dest_root = dest_root.as_ref();
        let groups = self.group_files(root, verbose)?;

        let mut report = DuplicateReport {
            files_scanned: groups.files_scanned,
            files_skipped: groups.files_skipped,
            groups: Vec::new(),
        };

        for (key, members) in groups.interesting() {
            let members = members
                .iter()
                .map(|source| self.report_member(source, dest_root, quarantine, verbose))
                .collect();
            report.groups.push(GroupReport {
                key: key.clone(),
                members,
            });
        }
        info!("Found {} duplicate groups", report.groups.len());
        Ok(report)
    }

    fn report_member(
        &mut self,
        source: &Path,
        dest_root: &Path,
        quarantine: Option<&Path>,
        verbose: bool,
    ) -> MemberReport {
        match self.extractor.extract_tags(source, verbose) {
            Ok(tags) => {
                let destination = DestinationKey::resolve(&tags).path_under(dest_root);
                let suggestion = suggest_action(source, &destination, quarantine);
                MemberReport::Resolved {
                    source: source.to_path_buf(),
                    destination,
                    suggestion,
                }
            }
            Err(e) => MemberReport::Skipped {
                source: source.to_path_buf(),
                reason: e.to_string(),
            },
        }
    }
}

/// With a quarantine directory the source is moved there and its converted
/// copy deleted; otherwise the source itself is deleted.
pub fn suggest_action(source: &Path, destination: &Path, quarantine: Option<&Path>) -> String {
    match quarantine {
        Some(dir) => format!(
            "mv {} {}/ && rm -f {}",
            shell_quote(source),
            shell_quote(dir),
            shell_quote(destination)
        ),
        None => format!("rm {}", shell_quote(source)),
    }
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}
