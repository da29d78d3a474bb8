//! Canonical branch names for work items.
//!
//! `encode` turns an id and title into a ref-safe slug such as
//! `tor/123-fix-bug`. `matches` answers the reverse question for branches
//! that already exist on the remote, possibly under someone else's prefix or
//! an older title.

use crate::identifiers::WorkItemId;

const HEADS_PREFIX: &str = "refs/heads/";

pub fn encode(id: WorkItemId, title: &str, prefix: &str) -> String {
    let combined = format!("{id} {title}").to_lowercase();
    let mut slug = String::with_capacity(combined.len());
    let mut pending_separator = false;

    for ch in combined.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        } else {
            pending_separator = true;
        }
    }

    format!("{prefix}{slug}")
}

pub fn matches(existing_branch_name: &str, id: WorkItemId, title: &str) -> bool {
    let slug = encode(id, title, "");
    let lower = existing_branch_name.to_lowercase();
    let suffix = format!("/{slug}");
    let id_needle = format!("/{id}-");

    lower.ends_with(&suffix)
        || lower.contains(&id_needle)
        || short_branch_name(&lower) == slug
}

pub fn is_head_ref(name: &str) -> bool {
    name.get(..HEADS_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(HEADS_PREFIX))
}

pub fn short_branch_name(name: &str) -> &str {
    if is_head_ref(name) {
        &name[HEADS_PREFIX.len()..]
    } else {
        name
    }
}

pub fn head_ref(branch: &str) -> String {
    format!("{HEADS_PREFIX}{}", short_branch_name(branch))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u64) -> WorkItemId {
        WorkItemId::new(value)
    }

    #[test]
    fn encode_builds_prefixed_slug() {
        assert_eq!(encode(id(123), "Fix Bug!!", "tor/"), "tor/123-fix-bug");
        assert_eq!(encode(id(123), "Fix Bug!!", ""), "123-fix-bug");
    }

    #[test]
    fn encode_collapses_runs_and_trims_separators() {
        assert_eq!(
            encode(id(7), "  --Add   OAuth2 (PKCE) flow__ ", "feature/"),
            "feature/7-add-oauth2-pkce-flow"
        );
        assert_eq!(encode(id(7), "???", ""), "7");
        assert_eq!(encode(id(7), "", "me/"), "me/7");
    }

    #[test]
    fn encode_drops_non_ascii_letters() {
        assert_eq!(encode(id(42), "Überprüfung café", ""), "42-berpr-fung-caf");
    }

    #[test]
    fn encode_is_deterministic() {
        let first = encode(id(9001), "Refactor: parser / lexer", "jane/");
        for _ in 0..5 {
            assert_eq!(encode(id(9001), "Refactor: parser / lexer", "jane/"), first);
        }
    }

    #[test]
    fn matches_branches_from_other_prefixes() {
        assert!(matches("refs/heads/other/123-fix-bug", id(123), "Fix Bug!!"));
        assert!(matches("refs/heads/tor/123-FIX-BUG", id(123), "Fix Bug!!"));
        assert!(!matches("refs/heads/feature/456-fix-bug", id(123), "Fix Bug!!"));
    }

    #[test]
    fn matches_renamed_items_by_id() {
        assert!(matches(
            "refs/heads/jane/123-old-title",
            id(123),
            "New title"
        ));
        assert!(!matches("refs/heads/jane/1234-old-title", id(123), "New title"));
    }

    #[test]
    fn canonical_slug_matches_itself() {
        for (value, title) in [(1, "a"), (123, "Fix Bug!!"), (5, ""), (77, "%%%")] {
            let slug = encode(id(value), title, "");
            assert!(matches(&slug, id(value), title), "slug {slug} should match");
            let prefixed = encode(id(value), title, "someone/");
            assert!(matches(&prefixed, id(value), title));
        }
    }

    #[test]
    fn short_branch_name_strips_heads_prefix_case_insensitively() {
        assert_eq!(short_branch_name("refs/heads/tor/1-a"), "tor/1-a");
        assert_eq!(short_branch_name("REFS/HEADS/tor/1-a"), "tor/1-a");
        assert_eq!(short_branch_name("tor/1-a"), "tor/1-a");
        assert!(!is_head_ref("refs/tags/v1"));
        assert_eq!(head_ref("refs/heads/main"), "refs/heads/main");
        assert_eq!(head_ref("main"), "refs/heads/main");
    }
}
