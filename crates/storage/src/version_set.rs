//! `VersionSet` — the external collaborator named but not specified in
//! detail by the source spec (`VersionSet.Recover`, `LogAndApply`,
//! `NewFileNumber`, `MarkFileNumberUsed`). This module gives it the
//! narrow, concrete body `Db::open` needs to drive recovery.

use std::path::{Path, PathBuf};

use strata_core::error::{Error, Result};
use strata_core::{FileNumber, SequenceNumber};

use crate::column_family::ColumnFamilyDescriptor;
use crate::current::{read_current, write_current};
use crate::file_meta::FileMeta;
use crate::version_edit::{ManifestReader, ManifestWriter, VersionEdit};

/// Per-column-family state folded out of the MANIFEST's `VersionEdit`
/// stream.
#[derive(Debug, Clone)]
pub struct ColumnFamilyState {
    /// Column family id, assigned in MANIFEST order starting at 0.
    pub id: u32,
    /// Column family name.
    pub name: String,
    /// `log_number`: every WAL file with a smaller number is obsolete for
    /// this column family (spec §3 invariant).
    pub log_number: u64,
    /// Files by level; index 0 is L0.
    pub files: Vec<Vec<FileMeta>>,
}

impl ColumnFamilyState {
    fn new(id: u32, name: String) -> Self {
        ColumnFamilyState { id, name, log_number: 0, files: Vec::new() }
    }

    fn apply(&mut self, edit: &VersionEdit) {
        if let Some(ln) = edit.log_number {
            self.log_number = ln;
        }
        for (level, meta) in &edit.added_files {
            let level = *level as usize;
            if self.files.len() <= level {
                self.files.resize_with(level + 1, Vec::new);
            }
            self.files[level].push(meta.clone());
        }
        for (level, number) in &edit.deleted_files {
            let level = *level as usize;
            if let Some(v) = self.files.get_mut(level) {
                v.retain(|f| f.number.0 != *number);
            }
        }
    }

    /// Highest file number observed in this column family's file set.
    pub fn max_file_number(&self) -> Option<FileNumber> {
        self.files.iter().flatten().map(|f| f.number).max()
    }
}

/// Aggregates `VersionEdit`s into the live column-family/version state,
/// and is the single place new file numbers and MANIFEST commits flow
/// through (spec §4.4, §4.8, §4.9).
pub struct VersionSet {
    dbname: PathBuf,
    column_families: Vec<ColumnFamilyState>,
    next_file_number: u64,
    last_sequence: SequenceNumber,
    db_id: Option<String>,
    manifest_file_number: u64,
}

impl VersionSet {
    /// `VersionSet.Recover(column_families, read_only)` (spec §4.4).
    ///
    /// Parses `CURRENT`, then the named MANIFEST as a sequence of
    /// `VersionEdit` records, reconstructing every column family's
    /// file-by-level layout, `log_number`, `next_file_number`,
    /// `last_sequence`, and `db_id`.
    pub fn recover(dbname: &Path, descriptors: &[ColumnFamilyDescriptor]) -> Result<Self> {
        let manifest_number = read_current(dbname)?;
        let manifest_path = manifest_path(dbname, manifest_number);
        let edits = ManifestReader::open(&manifest_path)?.read_all()?;

        let mut column_families: Vec<ColumnFamilyState> = Vec::new();
        let mut next_file_number: u64 = 2;
        let mut last_sequence = SequenceNumber::ZERO;
        let mut db_id = None;

        for edit in &edits {
            if let Some(name) = &edit.new_column_family {
                column_families.push(ColumnFamilyState::new(edit.column_family_id, name.clone()));
            }
            if edit.dropped {
                column_families.retain(|cf| cf.id != edit.column_family_id);
            } else if let Some(cf) = column_families
                .iter_mut()
                .find(|cf| cf.id == edit.column_family_id)
            {
                cf.apply(edit);
            }
            if let Some(n) = edit.next_file_number {
                next_file_number = next_file_number.max(n);
            }
            if let Some(s) = edit.last_sequence {
                last_sequence = SequenceNumber(last_sequence.0.max(s));
            }
            if let Some(id) = &edit.db_id {
                db_id = Some(id.clone());
            }
        }

        let requested: std::collections::HashSet<&str> =
            descriptors.iter().map(|d| d.name.as_str()).collect();
        let found: std::collections::HashSet<&str> =
            column_families.iter().map(|cf| cf.name.as_str()).collect();
        let missing: Vec<&str> = requested.difference(&found).copied().collect();
        if !missing.is_empty() {
            return Err(Error::invalid_argument(format!(
                "column families missing from manifest: {missing:?}"
            )));
        }

        Ok(VersionSet {
            dbname: dbname.to_path_buf(),
            column_families,
            next_file_number,
            last_sequence,
            db_id,
            manifest_file_number: manifest_number,
        })
    }

    /// Iterate the recovered column families.
    pub fn column_families(&self) -> &[ColumnFamilyState] {
        &self.column_families
    }

    /// Find a column family by name.
    pub fn column_family(&self, name: &str) -> Option<&ColumnFamilyState> {
        self.column_families.iter().find(|cf| cf.name == name)
    }

    /// The recovered `last_sequence` watermark.
    pub fn last_sequence(&self) -> SequenceNumber {
        self.last_sequence
    }

    /// Advance `last_sequence` forward (WAL replay advances it as records
    /// are applied; spec §5 "sequence numbers assigned during replay are
    /// monotonically non-decreasing").
    pub fn advance_last_sequence(&mut self, to: SequenceNumber) {
        if to > self.last_sequence {
            self.last_sequence = to;
        }
    }

    /// The recovered db id, if any.
    pub fn db_id(&self) -> Option<&str> {
        self.db_id.as_deref()
    }

    /// `VersionSet.NewFileNumber()`: hand out the next file number and
    /// advance the counter so it is never reused.
    pub fn new_file_number(&mut self) -> FileNumber {
        let n = FileNumber(self.next_file_number);
        self.next_file_number += 1;
        n
    }

    /// `VersionSet.MarkFileNumberUsed(n)`: nudge the counter past a number
    /// observed elsewhere (a skipped WAL, an existing file) so it is never
    /// handed out again (spec §4.6, §8 "no reuse").
    pub fn mark_file_number_used(&mut self, n: FileNumber) {
        if n.0 >= self.next_file_number {
            self.next_file_number = n.0 + 1;
        }
    }

    /// The current `next_file_number` counter, for invariant checks and
    /// tests.
    pub fn next_file_number(&self) -> u64 {
        self.next_file_number
    }

    /// `VersionSet.LogAndApply`: atomically apply a batch of pending edits
    /// across all column families, rotating the MANIFEST descriptor when
    /// `new_descriptor_log` is set (spec §4.8, §4.9's single commit).
    pub fn log_and_apply(&mut self, mut edits: Vec<VersionEdit>, new_descriptor_log: bool) -> Result<()> {
        for edit in &mut edits {
            edit.next_file_number = Some(self.next_file_number);
            edit.last_sequence = Some(self.last_sequence.0);
        }

        let target_manifest_number = if new_descriptor_log {
            self.new_file_number().0
        } else {
            self.manifest_file_number
        };

        if new_descriptor_log {
            let new_path = manifest_path(&self.dbname, target_manifest_number);
            let mut writer = ManifestWriter::create(&new_path)?;
            for cf in &self.column_families {
                let mut base = VersionEdit::new(cf.id);
                base.set_new_column_family(cf.name.clone());
                base.log_number = Some(cf.log_number);
                for (level, files) in cf.files.iter().enumerate() {
                    for f in files {
                        base.add_file(level as u32, f.clone());
                    }
                }
                writer.append(&base)?;
            }
            for edit in &edits {
                writer.append(edit)?;
            }
            write_current(&self.dbname, target_manifest_number)?;
            self.manifest_file_number = target_manifest_number;
        } else {
            let path = manifest_path(&self.dbname, self.manifest_file_number);
            let mut writer = open_for_append(&path)?;
            for edit in &edits {
                writer.append(edit)?;
            }
        }

        for edit in &edits {
            if edit.dropped {
                self.column_families.retain(|cf| cf.id != edit.column_family_id);
            } else if let Some(cf) = self
                .column_families
                .iter_mut()
                .find(|cf| cf.id == edit.column_family_id)
            {
                cf.apply(edit);
            } else if let Some(name) = &edit.new_column_family {
                let mut cf = ColumnFamilyState::new(edit.column_family_id, name.clone());
                cf.apply(edit);
                self.column_families.push(cf);
            }
            if let Some(id) = &edit.db_id {
                self.db_id = Some(id.clone());
            }
        }

        Ok(())
    }

    /// Path to the MANIFEST file currently named by `CURRENT`.
    pub fn manifest_path(&self) -> PathBuf {
        manifest_path(&self.dbname, self.manifest_file_number)
    }
}

fn open_for_append(path: &Path) -> Result<ManifestWriter> {
    ManifestWriter::open_append(path)
}

/// `<dbname>/MANIFEST-<N>` (spec §6).
pub fn manifest_path(dbname: &Path, number: u64) -> PathBuf {
    dbname.join(format!("MANIFEST-{number:06}"))
}
