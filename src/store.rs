use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{NoteError, Result};
use crate::events::ReportUpdated;
use crate::note::{local_timestamp, Clock, Importance, Note};
use crate::render::ReportRenderer;

/// On-disk document shape.
#[derive(Debug, Default, Deserialize)]
struct NotesDocument {
    #[serde(default)]
    notes: Vec<Note>,
}

#[derive(Serialize)]
struct NotesDocumentRef<'a> {
    notes: &'a [Note],
}

/// Fields to overwrite in `modify_note`. `None` leaves the field unchanged.
#[derive(Debug, Default, Clone)]
pub struct NoteChanges {
    pub content: Option<String>,
    pub importance: Option<Importance>,
    pub category: Option<String>,
}

/// Conjunctive search filters. Empty strings count as absent.
#[derive(Debug, Default, Clone)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub importance: Option<String>,
    pub category: Option<String>,
}

impl SearchQuery {
    pub fn matches(&self, note: &Note) -> bool {
        if let Some(keyword) = non_empty(&self.keyword) {
            if !note.content.to_lowercase().contains(&keyword.to_lowercase()) {
                return false;
            }
        }
        if let Some(importance) = non_empty(&self.importance) {
            if Importance::recognize(importance) != Some(note.importance) {
                return false;
            }
        }
        if let Some(category) = non_empty(&self.category) {
            if note.category.to_lowercase() != category.to_lowercase() {
                return false;
            }
        }
        true
    }
}

fn non_empty(filter: &Option<String>) -> Option<&str> {
    filter.as_deref().filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionSummary {
    pub id: u64,
    pub remaining: usize,
}

/// Value produced by a store operation, plus the outcome of the report
/// regeneration that followed it. A failed report never fails the operation.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub report: Result<ReportUpdated>,
}

/// In-memory note collection backed by a JSON document.
///
/// Not synchronised: callers serialise access.
pub struct NoteStore {
    notes: Vec<Note>,
    next_id: u64,
    data_file: PathBuf,
    renderer: ReportRenderer,
    clock: Clock,
}

impl NoteStore {
    /// Load the store from `data_file`. A missing or unreadable document
    /// yields an empty store.
    pub fn open(data_file: impl Into<PathBuf>, renderer: ReportRenderer) -> Self {
        let data_file = data_file.into();
        let mut notes = load_notes(&data_file);
        let next_id = match next_id_after(&notes) {
            Some(id) => id,
            None => {
                log::error!(
                    "Notes file '{}' uses the largest possible id, starting empty",
                    data_file.display()
                );
                notes.clear();
                1
            }
        };
        Self {
            notes,
            next_id,
            data_file,
            renderer,
            clock: Box::new(local_timestamp),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn add_note(
        &mut self,
        content: &str,
        importance: Importance,
        category: &str,
    ) -> Result<Outcome<Note>> {
        validate_content(content)?;
        let following = self.next_id.checked_add(1).ok_or(NoteError::IdsExhausted)?;

        let note = Note {
            id: self.next_id,
            content: content.to_string(),
            timestamp: (self.clock)(),
            importance,
            category: category.to_string(),
        };
        self.notes.push(note.clone());
        self.next_id = following;
        log::info!("Added note {} ({}, {})", note.id, note.importance, note.category);

        self.save()?;
        let report = self.render_report(&self.notes);
        Ok(Outcome { value: note, report })
    }

    pub fn modify_note(&mut self, id: u64, changes: NoteChanges) -> Result<Outcome<Note>> {
        let position = self
            .notes
            .iter()
            .position(|n| n.id == id)
            .ok_or(NoteError::NotFound(id))?;
        if let Some(content) = &changes.content {
            validate_content(content)?;
        }

        let timestamp = (self.clock)();
        let note = &mut self.notes[position];

        if let Some(content) = changes.content {
            note.content = content;
            note.timestamp = timestamp;
        }
        if let Some(importance) = changes.importance {
            note.importance = importance;
        }
        if let Some(category) = changes.category {
            note.category = category;
        }
        let updated = note.clone();
        log::info!("Modified note {}", id);

        self.save()?;
        let report = self.render_report(&self.notes);
        Ok(Outcome { value: updated, report })
    }

    pub fn delete_note(&mut self, id: u64) -> Result<Outcome<DeletionSummary>> {
        let position = self
            .notes
            .iter()
            .position(|n| n.id == id)
            .ok_or(NoteError::NotFound(id))?;
        self.notes.remove(position);
        log::info!("Deleted note {} ({} remaining)", id, self.notes.len());

        self.save()?;
        let report = self.render_report(&self.notes);
        Ok(Outcome {
            value: DeletionSummary {
                id,
                remaining: self.notes.len(),
            },
            report,
        })
    }

    /// Filter notes, keeping insertion order. The report shows only matches.
    pub fn search_notes(&self, query: &SearchQuery) -> Outcome<Vec<Note>> {
        let matches: Vec<Note> = self
            .notes
            .iter()
            .filter(|n| query.matches(n))
            .cloned()
            .collect();
        log::debug!("Search {:?} matched {} notes", query, matches.len());
        let report = self.render_report(&matches);
        Outcome {
            value: matches,
            report,
        }
    }

    pub fn list_all_notes(&self) -> Outcome<Vec<Note>> {
        let report = self.render_report(&self.notes);
        Outcome {
            value: self.notes.clone(),
            report,
        }
    }

    /// Regenerate the report for `subset` against the current total.
    pub fn render_report(&self, subset: &[Note]) -> Result<ReportUpdated> {
        let path = self.renderer.write(self.notes.len(), subset).map_err(|e| {
            log::error!("Failed to write report: {}", e);
            e
        })?;
        Ok(ReportUpdated {
            path,
            displayed: subset.len(),
            total: self.notes.len(),
        })
    }

    /// Rewrite the whole document via a temporary file and rename.
    fn save(&self) -> Result<()> {
        let dir = self
            .data_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| NoteError::io(dir, e))?;

        let content = serde_json::to_string_pretty(&NotesDocumentRef { notes: &self.notes })?;
        let tmp_file = dir.join(format!(".notes-{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(|e| NoteError::io(&tmp_file, e))?;
        fs::rename(&tmp_file, &self.data_file).map_err(|e| {
            let _ = fs::remove_file(&tmp_file);
            log::error!("Failed to save notes: {}", e);
            NoteError::io(&self.data_file, e)
        })?;

        log::info!(
            "Saved {} notes to '{}'",
            self.notes.len(),
            self.data_file.display()
        );
        Ok(())
    }
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(NoteError::Validation(
            "Note content must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// One past the largest stored id, or `None` if that would overflow.
fn next_id_after(notes: &[Note]) -> Option<u64> {
    match notes.iter().map(|n| n.id).max() {
        Some(max) => max.checked_add(1),
        None => Some(1),
    }
}

fn load_notes(path: &Path) -> Vec<Note> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!(
                "Notes file '{}' does not exist yet, starting empty",
                path.display()
            );
            return Vec::new();
        }
        Err(e) => {
            log::error!("Failed to read notes file '{}': {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<NotesDocument>(&content) {
        Ok(doc) => {
            log::info!("Loaded {} notes from '{}'", doc.notes.len(), path.display());
            doc.notes
        }
        Err(e) => {
            log::warn!(
                "Notes file '{}' is corrupt or empty, starting empty: {}",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}
