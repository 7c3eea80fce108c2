//! `fields`: list the computable fields of each catalog and the ticket
//! fields the `jira` command writes.

use std::fmt::Write as _;

use reconcile::{FieldCatalog, TICKET_FIELDS};

/// Renders every field list, one field per line.
pub fn render() -> String {
    let mut out = String::new();
    for (title, catalog) in [
        ("Pull request fields", FieldCatalog::pull_requests()),
        ("Issue fields", FieldCatalog::issues()),
    ] {
        let _ = writeln!(out, "{title} ({}):", catalog.len());
        for definition in catalog.definitions() {
            let _ = writeln!(out, "  {:<30} {}", definition.name, definition.kind);
        }
    }
    let _ = writeln!(out, "Jira ticket fields ({}):", TICKET_FIELDS.len());
    for (name, kind) in TICKET_FIELDS {
        let _ = writeln!(out, "  {name:<30} {kind}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_both_catalogs() {
        let text = render();
        assert!(text.contains("Pull request fields (12):"));
        assert!(text.contains("Issue fields (6):"));
        assert!(text.contains("Jira ticket fields (9):"));
        assert!(text
            .lines()
            .any(|l| l.trim_start().starts_with("Age (days)") && l.ends_with("number")));
        assert!(text
            .lines()
            .any(|l| l.trim_start().starts_with("Status") && l.ends_with("single-select")));
        assert!(text
            .lines()
            .any(|l| l.trim_start().starts_with("Issue#") && l.ends_with("text")));
    }
}
