//! Plain-text summary of a work item and the items around it, meant to be
//! pasted into an assistant prompt.

use std::fmt::Write as _;

use crate::model::{RelationGraph, WorkItemIdentity};

const ENTITIES: [(&str, &str); 5] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
];

/// Replaces every `<...>` tag with a space, decodes the handful of entities
/// the service emits and trims the result.
pub fn clean_description(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find('<') {
        let Some(length) = rest[start..].find('>') else {
            break;
        };
        text.push_str(&rest[..start]);
        text.push(' ');
        rest = &rest[start + length + 1..];
    }
    text.push_str(rest);

    let mut decoded = text;
    for (entity, replacement) in ENTITIES {
        decoded = decoded.replace(entity, replacement);
    }
    decoded.trim().to_owned()
}

/// Children are left out; the summary describes where the item sits, not
/// how it is broken down.
pub fn render_context(work_item: &WorkItemIdentity, graph: &RelationGraph) -> String {
    let mut context = format!("#{}: {}", work_item.id, work_item.title);
    let description = clean_description(&work_item.description);
    if !description.is_empty() {
        let _ = write!(context, "\n\nDescription:\n{description}");
    }

    let mut sections = Vec::new();
    if let Some(parent) = &graph.parent {
        sections.push(format!(
            "Parent #{}: {}{}",
            parent.id,
            parent.title,
            indented_description(parent, "\n")
        ));
    }
    for (heading, items) in [("Siblings:", &graph.siblings), ("Related:", &graph.related)] {
        if items.is_empty() {
            continue;
        }
        sections.push(heading.to_owned());
        for item in items {
            sections.push(format!(
                "- #{}: {}{}",
                item.id,
                item.title,
                indented_description(item, "\n  ")
            ));
        }
    }

    if !sections.is_empty() {
        let _ = write!(
            context,
            "\n\nThis is related information:\n{}",
            sections.join("\n\n")
        );
    }
    context
}

fn indented_description(item: &WorkItemIdentity, lead: &str) -> String {
    let description = clean_description(&item.description);
    if description.is_empty() {
        String::new()
    } else {
        format!("{lead}{description}")
    }
}
