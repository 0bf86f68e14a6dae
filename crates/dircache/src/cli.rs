//! CLI helpers: type resolution and output formatting
//!
//! Kept free of I/O so the formatting can be tested without a session.

use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use dircache_core::dircache_types::{
    FieldDescriptor, MessageKind, ObjectHandle, TypeDescriptor, TypeId,
};
use dircache_core::{cmp_ignore_case, FieldTemplates};
use std::cmp::Ordering;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum CliError {
    UnknownType {
        query: String,
        known: usize,
    },
    AmbiguousType {
        query: String,
        suggestions: String,
    },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::UnknownType { query, known } => {
                write!(f, "No type matches '{}' ({} types known)", query, known)
            }
            CliError::AmbiguousType { query, suggestions } => {
                write!(f, "Ambiguous type '{}':\n{}", query, suggestions)
            }
        }
    }
}

impl std::error::Error for CliError {}

// ============================================================================
// Type Resolution
// ============================================================================

/// Find a type by numeric id, exact name, or case-insensitive name
pub fn resolve_type<'a>(
    types: &'a [TypeDescriptor],
    query: &str,
) -> Result<&'a TypeDescriptor, CliError> {
    if let Ok(id) = query.parse::<TypeId>() {
        if let Some(descriptor) = types.iter().find(|t| t.id == id) {
            return Ok(descriptor);
        }
    }

    if let Some(descriptor) = types.iter().find(|t| t.name == query) {
        return Ok(descriptor);
    }

    let matches: Vec<_> = types
        .iter()
        .filter(|t| cmp_ignore_case(&t.name, query) == Ordering::Equal)
        .collect();

    match matches.len() {
        0 => Err(CliError::UnknownType {
            query: query.to_string(),
            known: types.len(),
        }),
        1 => Ok(matches[0]),
        _ => {
            let suggestions = matches
                .iter()
                .map(|t| format!("  - {} ({})", t.name, t.id))
                .collect::<Vec<_>>()
                .join("\n");
            Err(CliError::AmbiguousType {
                query: query.to_string(),
                suggestions,
            })
        }
    }
}

// ============================================================================
// Formatters
// ============================================================================

fn new_table(headers: &[&str], no_color: bool) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    if no_color {
        table.set_header(headers.to_vec());
    } else {
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::Cyan))
                .collect::<Vec<_>>(),
        );
    }
    table
}

fn flag(set: bool) -> &'static str {
    if set {
        "yes"
    } else {
        "-"
    }
}

/// Format the type list as table (human) or JSON
pub fn format_type_table(types: &[TypeDescriptor], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(types).unwrap_or_else(|_| "[]".to_string());
    }

    if types.is_empty() {
        return "No types defined.".to_string();
    }

    let mut table = new_table(
        &["ID", "Name", "Label Field", "Embedded", "Create", "Inactivate"],
        no_color,
    );

    for descriptor in types {
        let label_field = descriptor
            .label_field
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(Row::from(vec![
            descriptor.id.to_string(),
            descriptor.name.clone(),
            label_field,
            flag(descriptor.embedded).to_string(),
            flag(descriptor.can_create).to_string(),
            flag(descriptor.can_inactivate).to_string(),
        ]));
    }

    table.to_string()
}

/// Format a type's field templates as table (human) or JSON
pub fn format_field_table(
    descriptor: &TypeDescriptor,
    templates: &FieldTemplates,
    type_name: impl Fn(TypeId) -> String,
    json: bool,
    no_color: bool,
) -> String {
    if json {
        return serde_json::to_string_pretty(templates.fields())
            .unwrap_or_else(|_| "[]".to_string());
    }

    if templates.is_empty() {
        return format!("{} has no fields.", descriptor.name);
    }

    let mut table = new_table(&["ID", "Name", "Kind", "Target", "Tab"], no_color);

    for field in templates.fields() {
        table.add_row(Row::from(vec![
            field.id.to_string(),
            field.name.clone(),
            field_kind(field),
            field
                .target_type
                .map(&type_name)
                .unwrap_or_else(|| "-".to_string()),
            field.tab_name.clone().unwrap_or_else(|| "-".to_string()),
        ]));
    }

    table.to_string()
}

fn field_kind(field: &FieldDescriptor) -> String {
    if field.array {
        format!("{}[]", field.kind)
    } else {
        field.kind.to_string()
    }
}

/// Status column for a handle
pub fn handle_status(handle: &ObjectHandle) -> String {
    let mut parts = Vec::new();
    if handle.inactive {
        parts.push("inactive");
    }
    if !handle.editable {
        parts.push("read-only");
    }
    if handle.expiration_set {
        parts.push("expires");
    }
    if handle.removal_set {
        parts.push("pending removal");
    }

    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(", ")
    }
}

/// Format a listing view as table (human) or JSON
pub fn format_handle_table(handles: &[ObjectHandle], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(handles).unwrap_or_else(|_| "[]".to_string());
    }

    if handles.is_empty() {
        return "No objects found.".to_string();
    }

    let mut table = new_table(&["ID", "Label", "Status"], no_color);
    for handle in handles {
        table.add_row(Row::from(vec![
            handle.id.to_string(),
            handle.label.clone(),
            handle_status(handle),
        ]));
    }

    table.to_string()
}

/// Format received server messages, one per line
///
/// `dropped` counts messages the output fell too far behind to see.
pub fn format_messages(
    messages: &[(MessageKind, String)],
    dropped: u64,
    disconnect: Option<&str>,
) -> String {
    let mut lines: Vec<String> = messages
        .iter()
        .map(|(kind, text)| format!("[{}] {}", kind, text))
        .collect();

    if dropped > 0 {
        lines.push(format!("({} messages dropped)", dropped));
    }

    if let Some(reason) = disconnect {
        lines.push(format!("Disconnected by server: {}", reason));
    }

    if lines.is_empty() {
        return "No messages.".to_string();
    }
    lines.join("\n")
}
