//! Identifier assignment for resources created without an explicit id.

use uuid::Uuid;

/// Length of the token-derived suffix.
const SUFFIX_LENGTH: usize = 12;

/// Namespace for token-derived suffixes.
const IDENTIFIER_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_3c2e_8a4d_4b7e_9c1d_2e5f_7a90_b3c4);

/// Generate a lower-case identifier from a logical resource name and a client request token.
///
/// The result is `<logical-prefix>-<suffix>` where the suffix is derived from
/// the token alone, so retries of the same request produce the same name. The
/// prefix is truncated so the whole value never exceeds `max_length`.
pub fn generate_identifier(logical_id: &str, request_token: &str, max_length: usize) -> String {
    let suffix = token_suffix(request_token);

    let prefix_budget = max_length.saturating_sub(SUFFIX_LENGTH + 1);
    let prefix: String = logical_id
        .to_lowercase()
        .chars()
        .take(prefix_budget)
        .collect();

    if prefix.is_empty() {
        suffix.chars().take(max_length).collect()
    } else {
        format!("{}-{}", prefix, suffix)
    }
}

fn token_suffix(request_token: &str) -> String {
    let digest = Uuid::new_v5(&IDENTIFIER_NAMESPACE, request_token.as_bytes());
    let mut suffix = digest.simple().to_string();
    suffix.truncate(SUFFIX_LENGTH);
    suffix
}
