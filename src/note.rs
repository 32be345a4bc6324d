use chrono::Local;
use serde::{Deserialize, Serialize};

/// Format used for note timestamps (second precision, local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// A single sticky note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// How urgent a note is.
///
/// Parsing never fails: anything unrecognised becomes `Normal`. Documents
/// written by older versions used Chinese labels, which are still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Importance {
    #[default]
    Normal,
    Important,
    Urgent,
}

const IMPORTANCE_LABELS: &[(Importance, &str, &str)] = &[
    (Importance::Normal, "Normal", "普通"),
    (Importance::Important, "Important", "重要"),
    (Importance::Urgent, "Urgent", "紧急"),
];

impl Importance {
    /// Resolve a label to a recognised variant, if it names one.
    pub fn recognize(label: &str) -> Option<Self> {
        let label = label.trim();
        IMPORTANCE_LABELS
            .iter()
            .find(|(_, name, legacy)| name.eq_ignore_ascii_case(label) || *legacy == label)
            .map(|(importance, _, _)| *importance)
    }

    /// Parse with fallback to `Normal`.
    pub fn parse(label: &str) -> Self {
        Self::recognize(label).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Normal => "Normal",
            Importance::Important => "Important",
            Importance::Urgent => "Urgent",
        }
    }

    /// Star level shown in the report (1-3).
    pub fn level(&self) -> u8 {
        match self {
            Importance::Normal => 1,
            Importance::Important => 2,
            Importance::Urgent => 3,
        }
    }
}

impl From<String> for Importance {
    fn from(label: String) -> Self {
        Importance::parse(&label)
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report styling bucket for a free-form category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryStyle {
    Work,
    Life,
    Study,
    Other,
}

const CATEGORY_LABELS: &[(CategoryStyle, &str, &str)] = &[
    (CategoryStyle::Work, "work", "工作"),
    (CategoryStyle::Life, "life", "生活"),
    (CategoryStyle::Study, "study", "学习"),
];

impl CategoryStyle {
    pub fn for_category(category: &str) -> Self {
        let lowered = category.trim().to_lowercase();
        CATEGORY_LABELS
            .iter()
            .find(|(_, name, legacy)| *name == lowered || *legacy == lowered)
            .map(|(style, _, _)| *style)
            .unwrap_or(CategoryStyle::Other)
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            CategoryStyle::Work => "category-work",
            CategoryStyle::Life => "category-life",
            CategoryStyle::Study => "category-study",
            CategoryStyle::Other => "category-other",
        }
    }
}

/// Source of note timestamps. Injected so tests can control time.
pub type Clock = Box<dyn Fn() -> String + Send + Sync>;

pub fn local_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importance_parse_fallback() {
        assert_eq!(Importance::parse("Urgent"), Importance::Urgent);
        assert_eq!(Importance::parse("important"), Importance::Important);
        assert_eq!(Importance::parse("紧急"), Importance::Urgent);
        assert_eq!(Importance::parse("critical"), Importance::Normal);
        assert_eq!(Importance::parse(""), Importance::Normal);
        assert_eq!(Importance::recognize("whatever"), None);
    }

    #[test]
    fn test_importance_levels() {
        assert_eq!(Importance::Normal.level(), 1);
        assert_eq!(Importance::Important.level(), 2);
        assert_eq!(Importance::Urgent.level(), 3);
    }

    #[test]
    fn test_category_style_mapping() {
        assert_eq!(CategoryStyle::for_category("Work"), CategoryStyle::Work);
        assert_eq!(CategoryStyle::for_category("LIFE"), CategoryStyle::Life);
        assert_eq!(CategoryStyle::for_category("学习"), CategoryStyle::Study);
        assert_eq!(CategoryStyle::for_category("Hobbies"), CategoryStyle::Other);
        assert_eq!(CategoryStyle::Other.css_class(), "category-other");
    }

    #[test]
    fn test_note_defaults_missing_fields() {
        let json = r#"{"id": 3, "content": "old note", "timestamp": "2024-01-15 10:30:00"}"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.importance, Importance::Normal);
        assert_eq!(note.category, "Uncategorized");
    }

    #[test]
    fn test_note_serializes_importance_label() {
        let note = Note {
            id: 1,
            content: "Buy milk".to_string(),
            timestamp: "2024-01-15 10:30:00".to_string(),
            importance: Importance::Urgent,
            category: "Life".to_string(),
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["importance"], "Urgent");
        assert_eq!(value["category"], "Life");
    }

    #[test]
    fn test_local_timestamp_format() {
        let ts = local_timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }
}
