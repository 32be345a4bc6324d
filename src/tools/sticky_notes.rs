use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{parse_args, Tool, ToolRegistry, ToolResponse};
use crate::error;
use crate::events::{ReportEvents, ReportUpdated};
use crate::note::{Importance, DEFAULT_CATEGORY};
use crate::store::{NoteChanges, NoteStore, SearchQuery};

/// The note store as shared by the sticky-note tools.
///
/// The mutex is the only serialisation point; report events are published
/// after the lock is released.
pub struct NoteBoard {
    store: Mutex<NoteStore>,
    events: ReportEvents,
}

impl NoteBoard {
    pub fn new(store: NoteStore, events: ReportEvents) -> Self {
        Self {
            store: Mutex::new(store),
            events,
        }
    }

    /// Attach the report outcome to a successful response and notify listeners.
    async fn finish(
        &self,
        mut response: ToolResponse,
        report: error::Result<ReportUpdated>,
    ) -> ToolResponse {
        match report {
            Ok(event) => {
                let warnings = self.events.publish(&event).await;
                if !warnings.is_empty() {
                    response.preview_warning = Some(warnings.join("; "));
                }
            }
            Err(e) => {
                response.report_warning = Some(format!("Failed to generate HTML report: {}", e));
            }
        }
        response
    }
}

/// Register every sticky-note tool against a shared board.
pub fn register_sticky_note_tools(registry: &mut ToolRegistry, board: Arc<NoteBoard>) {
    registry.register(Arc::new(AddStickyNote(board.clone())));
    registry.register(Arc::new(ModifyStickyNote(board.clone())));
    registry.register(Arc::new(DeleteStickyNote(board.clone())));
    registry.register(Arc::new(SearchStickyNotes(board.clone())));
    registry.register(Arc::new(ListAllStickyNotes(board.clone())));
    registry.register(Arc::new(ShowStickyNotesHtml(board)));
}

fn importance_schema(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description,
        "enum": ["Normal", "Important", "Urgent"]
    })
}

pub struct AddStickyNote(Arc<NoteBoard>);

#[derive(Debug, Deserialize)]
struct AddArgs {
    #[serde(default)]
    content: String,
    importance: Option<String>,
    category: Option<String>,
}

#[async_trait::async_trait]
impl Tool for AddStickyNote {
    fn name(&self) -> &str {
        "add_sticky_note"
    }

    fn description(&self) -> &str {
        "Add a new sticky note. Returns the created note."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string", "description": "Note text (required)" },
                "importance": importance_schema("Importance, defaults to Normal"),
                "category": {
                    "type": "string",
                    "description": "Category such as Work, Life or Study",
                    "default": DEFAULT_CATEGORY
                }
            },
            "required": ["content"]
        })
    }

    async fn run(&self, arguments: Value) -> Result<ToolResponse> {
        let args: AddArgs = parse_args(arguments)?;
        let importance = args
            .importance
            .as_deref()
            .map(Importance::parse)
            .unwrap_or_default();
        let category = args.category.as_deref().unwrap_or(DEFAULT_CATEGORY);

        let outcome = self
            .0
            .store
            .lock()
            .await
            .add_note(&args.content, importance, category);

        Ok(match outcome {
            Ok(outcome) => {
                let response = ToolResponse::ok(
                    format!("Added note (ID: {})", outcome.value.id),
                    json!({ "note": outcome.value }),
                );
                self.0.finish(response, outcome.report).await
            }
            Err(e) => ToolResponse::failed(e),
        })
    }
}

pub struct ModifyStickyNote(Arc<NoteBoard>);

#[derive(Debug, Deserialize)]
struct ModifyArgs {
    note_id: u64,
    new_content: Option<String>,
    new_importance: Option<String>,
    new_category: Option<String>,
}

#[async_trait::async_trait]
impl Tool for ModifyStickyNote {
    fn name(&self) -> &str {
        "modify_sticky_note"
    }

    fn description(&self) -> &str {
        "Modify an existing sticky note. Omitted fields are left unchanged; \
         changing the content refreshes the timestamp."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "note_id": { "type": "integer", "minimum": 1, "description": "ID of the note to modify" },
                "new_content": { "type": "string", "description": "Replacement text" },
                "new_importance": importance_schema("Replacement importance"),
                "new_category": { "type": "string", "description": "Replacement category" }
            },
            "required": ["note_id"]
        })
    }

    async fn run(&self, arguments: Value) -> Result<ToolResponse> {
        let args: ModifyArgs = parse_args(arguments)?;
        let changes = NoteChanges {
            content: args.new_content,
            importance: args.new_importance.as_deref().map(Importance::parse),
            category: args.new_category,
        };

        let outcome = self.0.store.lock().await.modify_note(args.note_id, changes);

        Ok(match outcome {
            Ok(outcome) => {
                let response = ToolResponse::ok(
                    format!("Modified note (ID: {})", args.note_id),
                    json!({ "note": outcome.value }),
                );
                self.0.finish(response, outcome.report).await
            }
            Err(e) => ToolResponse::failed(e),
        })
    }
}

pub struct DeleteStickyNote(Arc<NoteBoard>);

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    note_id: u64,
}

#[async_trait::async_trait]
impl Tool for DeleteStickyNote {
    fn name(&self) -> &str {
        "delete_sticky_note"
    }

    fn description(&self) -> &str {
        "Delete a sticky note. Returns the number of remaining notes."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "note_id": { "type": "integer", "minimum": 1, "description": "ID of the note to delete" }
            },
            "required": ["note_id"]
        })
    }

    async fn run(&self, arguments: Value) -> Result<ToolResponse> {
        let args: DeleteArgs = parse_args(arguments)?;
        let outcome = self.0.store.lock().await.delete_note(args.note_id);

        Ok(match outcome {
            Ok(outcome) => {
                let response = ToolResponse::ok(
                    format!("Deleted note (ID: {})", outcome.value.id),
                    json!({ "remaining_notes": outcome.value.remaining }),
                );
                self.0.finish(response, outcome.report).await
            }
            Err(e) => ToolResponse::failed(e),
        })
    }
}

pub struct SearchStickyNotes(Arc<NoteBoard>);

#[derive(Debug, Default, Deserialize)]
struct SearchArgs {
    keyword: Option<String>,
    importance: Option<String>,
    category: Option<String>,
}

#[async_trait::async_trait]
impl Tool for SearchStickyNotes {
    fn name(&self) -> &str {
        "search_sticky_notes"
    }

    fn description(&self) -> &str {
        "Search sticky notes by keyword, importance and category. \
         All filters are optional and combined with AND."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "keyword": { "type": "string", "description": "Case-insensitive text to look for" },
                "importance": importance_schema("Only notes with this importance"),
                "category": { "type": "string", "description": "Only notes in this category" }
            }
        })
    }

    async fn run(&self, arguments: Value) -> Result<ToolResponse> {
        let args: SearchArgs = parse_args(arguments)?;
        let query = SearchQuery {
            keyword: args.keyword,
            importance: args.importance,
            category: args.category,
        };

        let outcome = self.0.store.lock().await.search_notes(&query);
        let response = ToolResponse::ok(
            format!("Found {} matching notes", outcome.value.len()),
            json!({ "matches": outcome.value }),
        );
        Ok(self.0.finish(response, outcome.report).await)
    }
}

pub struct ListAllStickyNotes(Arc<NoteBoard>);

#[async_trait::async_trait]
impl Tool for ListAllStickyNotes {
    fn name(&self) -> &str {
        "list_all_sticky_notes"
    }

    fn description(&self) -> &str {
        "List every sticky note in creation order."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn run(&self, _arguments: Value) -> Result<ToolResponse> {
        let outcome = self.0.store.lock().await.list_all_notes();
        let response = ToolResponse::ok(
            format!("{} notes in total", outcome.value.len()),
            json!({ "notes": outcome.value }),
        );
        Ok(self.0.finish(response, outcome.report).await)
    }
}

pub struct ShowStickyNotesHtml(Arc<NoteBoard>);

#[async_trait::async_trait]
impl Tool for ShowStickyNotesHtml {
    fn name(&self) -> &str {
        "show_sticky_notes_html"
    }

    fn description(&self) -> &str {
        "Regenerate the HTML page of all sticky notes and show it in the browser."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn run(&self, _arguments: Value) -> Result<ToolResponse> {
        let report = {
            let store = self.0.store.lock().await;
            store.render_report(store.notes())
        };

        Ok(match report {
            Ok(event) => {
                let response = ToolResponse::ok(
                    "Sticky notes page updated",
                    json!({ "report_path": event.path.display().to_string() }),
                );
                self.0.finish(response, Ok(event)).await
            }
            Err(e) => ToolResponse::failed(format!("Failed to generate HTML report: {}", e)),
        })
    }
}
