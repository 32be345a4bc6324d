use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use crate::error::{NoteError, Result};
use crate::note::{CategoryStyle, Note};

/// Writes the HTML report for a set of notes.
pub struct ReportRenderer {
    path: PathBuf,
}

impl ReportRenderer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Regenerate the report file for `notes`, out of `total` stored notes.
    pub fn write(&self, total: usize, notes: &[Note]) -> Result<PathBuf> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| NoteError::io(parent, e))?;
        }
        fs::write(&self.path, render_html(total, notes)).map_err(|e| NoteError::io(&self.path, e))?;
        log::debug!(
            "Report written to {} ({} of {} notes)",
            self.path.display(),
            notes.len(),
            total
        );
        Ok(self.path.clone())
    }
}

/// Escape the five HTML-reserved characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the full report document. Output depends only on the inputs.
pub fn render_html(total: usize, notes: &[Note]) -> String {
    let mut html = String::new();
    html.push_str(HEAD);

    html.push_str("<body>\n    <div class=\"container\">\n");
    html.push_str("        <header>\n            <h1>My Sticky Notes</h1>\n");
    html.push_str("            <p class=\"subtitle\">Every little thing worth remembering</p>\n");
    html.push_str("        </header>\n\n");

    html.push_str("        <div class=\"stats\">\n");
    push_stat(&mut html, total, "Total notes");
    push_stat(&mut html, notes.len(), "Showing");
    html.push_str("        </div>\n\n");

    if notes.len() != total {
        let _ = writeln!(
            html,
            "        <div class=\"search-info\">Showing {} notes</div>",
            notes.len()
        );
    }

    html.push_str("        <div class=\"note-grid\">\n");
    if notes.is_empty() {
        html.push_str(concat!(
            "            <div class=\"no-notes\">\n",
            "                <i class=\"far fa-sticky-note\"></i>\n",
            "                <h3>No notes found</h3>\n",
            "                <p>Try different search filters or add a new note</p>\n",
            "            </div>\n",
        ));
    } else {
        for note in notes {
            push_note_card(&mut html, note);
        }
    }
    html.push_str("        </div>\n    </div>\n</body>\n</html>\n");

    html
}

fn push_stat(html: &mut String, value: usize, label: &str) {
    let _ = write!(
        html,
        concat!(
            "            <div class=\"stat-card\">\n",
            "                <div class=\"stat-value\">{}</div>\n",
            "                <div class=\"stat-label\">{}</div>\n",
            "            </div>\n",
        ),
        value, label
    );
}

fn push_note_card(html: &mut String, note: &Note) {
    let style = CategoryStyle::for_category(&note.category);
    let _ = write!(
        html,
        concat!(
            "            <div class=\"note-card\">\n",
            "                <div class=\"note-header\">\n",
            "                    <span class=\"note-id\">#{id}</span>\n",
            "                    <div class=\"importance-stars importance-{level}\">\n",
            "                        <i class=\"fas fa-star star\"></i>\n",
            "                        <i class=\"fas fa-star star\"></i>\n",
            "                        <i class=\"fas fa-star star\"></i>\n",
            "                    </div>\n",
            "                </div>\n",
            "                <div class=\"note-content\">{content}</div>\n",
            "                <div class=\"note-footer\">\n",
            "                    <div class=\"note-timestamp\"><i class=\"far fa-clock\"></i> {timestamp}</div>\n",
            "                    <div class=\"note-tags\">\n",
            "                        <span class=\"tag {class}\"><i class=\"fas fa-tag\"></i> {category}</span>\n",
            "                    </div>\n",
            "                </div>\n",
            "            </div>\n",
        ),
        id = note.id,
        level = note.importance.level(),
        content = escape_html(&note.content),
        timestamp = escape_html(&note.timestamp),
        class = style.css_class(),
        category = escape_html(&note.category),
    );
}

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>My Sticky Notes</title>
    <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0-beta3/css/all.min.css">
    <style>
        :root {
            --primary-color: #4361ee;
            --work-color: #4361ee;
            --life-color: #4cc9f0;
            --study-color: #7209b7;
            --other-color: #6c757d;
        }
        body { font-family: sans-serif; margin: 0; padding: 20px; background-color: #f5f7fa; color: #333; line-height: 1.6; }
        .container { max-width: 1200px; margin: 0 auto; padding: 20px; }
        header { text-align: center; margin-bottom: 30px; padding-bottom: 20px; border-bottom: 1px solid #e0e0e0; }
        h1 { color: var(--primary-color); font-size: 2.5rem; margin-bottom: 10px; }
        .subtitle { color: #6c757d; font-weight: 300; }
        .stats { display: flex; justify-content: center; gap: 20px; margin-bottom: 20px; flex-wrap: wrap; }
        .stat-card { background: white; border-radius: 8px; padding: 15px 20px; box-shadow: 0 2px 4px rgba(0,0,0,0.05); min-width: 120px; text-align: center; }
        .stat-value { font-size: 1.5rem; font-weight: 700; color: var(--primary-color); }
        .stat-label { font-size: 0.85rem; color: #6c757d; }
        .search-info { text-align: center; margin-bottom: 20px; color: #6c757d; font-size: 0.9rem; }
        .note-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 25px; }
        .note-card { background: white; border-radius: 12px; box-shadow: 0 4px 6px rgba(0,0,0,0.05); display: flex; flex-direction: column; overflow: hidden; }
        .note-header { padding: 15px 20px; background: linear-gradient(135deg, #f5f7fa 0%, #c3cfe2 100%); display: flex; justify-content: space-between; align-items: center; }
        .note-id { font-size: 0.85rem; color: #6c757d; }
        .note-content { padding: 20px; flex-grow: 1; white-space: pre-wrap; color: #495057; border-bottom: 1px solid #f1f1f1; }
        .note-footer { padding: 15px 20px; background-color: #f8f9fa; }
        .note-timestamp { font-size: 0.8rem; color: #6c757d; }
        .note-tags { display: flex; flex-wrap: wrap; gap: 8px; margin-top: 10px; }
        .tag { font-size: 0.75rem; padding: 4px 10px; border-radius: 50px; }
        .importance-stars { display: flex; gap: 3px; }
        .star { color: #e0e0e0; font-size: 0.9rem; }
        .importance-1 .star:nth-child(1) { color: #ffc107; }
        .importance-2 .star:nth-child(-n+2) { color: #ffc107; }
        .importance-3 .star { color: #ffc107; }
        .category-work { background-color: rgba(67,97,238,0.1); color: var(--work-color); }
        .category-life { background-color: rgba(76,201,240,0.1); color: var(--life-color); }
        .category-study { background-color: rgba(114,9,183,0.1); color: var(--study-color); }
        .category-other { background-color: rgba(108,117,125,0.1); color: var(--other-color); }
        .no-notes { text-align: center; padding: 50px 20px; grid-column: 1 / -1; color: #6c757d; }
        .no-notes i { font-size: 3rem; color: #adb5bd; }
    </style>
</head>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Importance;

    fn note(id: u64, content: &str, importance: Importance, category: &str) -> Note {
        Note {
            id,
            content: content.to_string(),
            timestamp: "2024-01-15 10:30:00".to_string(),
            importance,
            category: category.to_string(),
        }
    }

    #[test]
    fn test_escape_html_all_reserved() {
        assert_eq!(
            escape_html(r#"<script>&"'"#),
            "&lt;script&gt;&amp;&quot;&#039;"
        );
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn test_render_escapes_note_content() {
        let notes = vec![note(1, r#"<script>alert("x")&'</script>"#, Importance::Normal, "Work")];
        let html = render_html(1, &notes);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&quot;x&quot;)&amp;&#039;&lt;/script&gt;"));
    }

    #[test]
    fn test_render_escapes_category() {
        let notes = vec![note(1, "ok", Importance::Normal, "<b>x</b>")];
        let html = render_html(1, &notes);
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
        assert!(html.contains("category-other"));
    }

    #[test]
    fn test_render_levels_and_classes() {
        let notes = vec![
            note(1, "a", Importance::Urgent, "Life"),
            note(2, "b", Importance::Important, "study"),
        ];
        let html = render_html(2, &notes);
        assert!(html.contains("importance-3"));
        assert!(html.contains("importance-2"));
        assert!(html.contains("tag category-life"));
        assert!(html.contains("tag category-study"));
        assert!(html.contains("#1"));
        assert!(html.contains("#2"));
    }

    #[test]
    fn test_render_counts_and_search_info() {
        let notes = vec![note(4, "subset", Importance::Normal, "Work")];
        let html = render_html(3, &notes);
        assert!(html.contains("<div class=\"stat-value\">3</div>"));
        assert!(html.contains("<div class=\"stat-value\">1</div>"));
        assert!(html.contains("Showing 1 notes"));

        let full = render_html(1, &notes);
        assert!(!full.contains("search-info\">"));
    }

    #[test]
    fn test_render_empty_placeholder() {
        let html = render_html(0, &[]);
        assert!(html.contains("No notes found"));
        assert!(!html.contains("note-card\""));
    }

    #[test]
    fn test_render_is_deterministic() {
        let notes = vec![note(1, "same", Importance::Normal, "Work")];
        assert_eq!(render_html(1, &notes), render_html(1, &notes));
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ReportRenderer::new(dir.path().join("out").join("notes.html"));
        let path = renderer.write(0, &[]).unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_write_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let renderer = ReportRenderer::new(blocker.join("notes.html"));
        assert!(matches!(renderer.write(0, &[]), Err(NoteError::Io { .. })));
    }
}
