//! Browser links into Azure DevOps.

use crate::identifiers::WorkItemId;

pub fn ensure_https_protocol(url: &str) -> String {
    let trimmed = url.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    }
}

pub fn work_item_url(organization: &str, project: &str, id: WorkItemId) -> String {
    format!(
        "{}/{}/_workitems/edit/{id}",
        organization_base(organization),
        encode_component(project)
    )
}

pub fn pull_request_url(organization: &str, project: &str, repository: &str, id: u64) -> String {
    format!(
        "{}/{}/_git/{}/pullrequest/{id}",
        organization_base(organization),
        encode_component(project),
        encode_component(repository)
    )
}

pub fn branch_url(organization: &str, project: &str, repository: &str, branch: &str) -> String {
    format!(
        "{}/{}/_git/{}?version=GB{}",
        organization_base(organization),
        encode_component(project),
        encode_component(repository),
        encode_component(branch)
    )
}

fn organization_base(organization: &str) -> String {
    ensure_https_protocol(organization)
        .trim_end_matches('/')
        .to_owned()
}

/// Percent-encodes everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
pub fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(char::from(byte)),
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_https_when_scheme_is_missing() {
        assert_eq!(ensure_https_protocol("dev.azure.com/acme"), "https://dev.azure.com/acme");
        assert_eq!(ensure_https_protocol("http://tfs.local/acme"), "http://tfs.local/acme");
        assert_eq!(ensure_https_protocol("HTTPS://dev.azure.com/a"), "HTTPS://dev.azure.com/a");
    }

    #[test]
    fn builds_item_and_review_links() {
        assert_eq!(
            work_item_url("https://dev.azure.com/acme/", "My Project", WorkItemId::new(12)),
            "https://dev.azure.com/acme/My%20Project/_workitems/edit/12"
        );
        assert_eq!(
            pull_request_url("dev.azure.com/acme", "Payments", "api & web", 7),
            "https://dev.azure.com/acme/Payments/_git/api%20%26%20web/pullrequest/7"
        );
    }

    #[test]
    fn branch_links_encode_slashes() {
        assert_eq!(
            branch_url("https://dev.azure.com/acme", "Payments", "api", "tor/12-fix"),
            "https://dev.azure.com/acme/Payments/_git/api?version=GBtor%2F12-fix"
        );
    }

    #[test]
    fn encodes_multibyte_characters_per_byte() {
        assert_eq!(encode_component("café (v2)!"), "caf%C3%A9%20(v2)!");
    }
}
