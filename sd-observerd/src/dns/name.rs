/// Wildcard label standing for any number of labels at either end of a pattern.
const MULTI_LABEL: &str = "**";

/// Wildcard label standing for exactly one label.
const ANY_LABEL: &str = "*";

/// Split a domain name into its labels, ignoring trailing dots.
pub fn split_host(name: &str) -> Vec<&str> {
    name.trim_end_matches('.').split('.').collect()
}

/// Match a domain name against a label pattern.
///
/// `*` matches any single label. A leading `**` matches any number of leading
/// labels and a trailing `**` any number of trailing labels, so
/// `**._tcp.local` matches every name under `_tcp.local`. When a pattern has
/// both, the leading expansion runs first and the trailing one works on its
/// output. Labels compare ASCII case-insensitively.
pub fn host_matches(candidate: &str, pattern: &str) -> bool {
    let candidate = split_host(candidate);
    let mut pattern = split_host(pattern);

    let leading = pattern.first() == Some(&MULTI_LABEL);
    let trailing = pattern.len() > 1 && pattern.last() == Some(&MULTI_LABEL);
    let fixed = pattern.len() - leading as usize - trailing as usize;

    // Cheap lower bound: every fixed label needs a candidate label.
    if candidate.len() < fixed {
        return false;
    }

    if leading {
        let wildcards = candidate.len().saturating_sub(pattern.len() - 1);
        let mut expanded = vec![ANY_LABEL; wildcards];
        expanded.extend_from_slice(&pattern[1..]);
        pattern = expanded;
    }
    if pattern.last() == Some(&MULTI_LABEL) {
        let wildcards = candidate.len().saturating_sub(pattern.len() - 1);
        pattern.pop();
        pattern.extend(std::iter::repeat(ANY_LABEL).take(wildcards));
    }

    candidate.len() == pattern.len()
        && candidate
            .iter()
            .zip(&pattern)
            .all(|(c, p)| *p == ANY_LABEL || c.eq_ignore_ascii_case(p))
}

/// Whether `name` lives under `_tcp.local` or `_udp.local`.
pub fn is_service_name(name: &str) -> bool {
    shared::protocol::SERVICE_NAME_PATTERNS
        .iter()
        .any(|pattern| host_matches(name, pattern))
}
