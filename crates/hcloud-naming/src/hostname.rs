//! Server name validation.
//!
//! Server names double as host names, so a rendered name must be an RFC 1123
//! host name: dot-separated labels of 1–63 letters, digits and inner
//! hyphens, at most 253 bytes overall.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{TemplateError, TemplateResult};

const MAX_NAME_LEN: usize = 253;

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$")
        .expect("label pattern is a valid regex")
});

/// Check that `name` can be used as a server name.
pub fn validate_server_name(name: &str) -> TemplateResult<()> {
    let invalid = |reason| TemplateError::InvalidName {
        name: name.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is longer than 253 bytes"));
    }
    if name.split('.').all(|label| LABEL_RE.is_match(label)) {
        Ok(())
    } else {
        Err(invalid(
            "labels must be 1-63 letters, digits or inner hyphens",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_host_names() {
        let longest_label = "x".repeat(63);
        for name in ["pool1-7", "POOL1-7", "a", "worker-3.fsn1", longest_label.as_str()] {
            assert!(validate_server_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_bad_names() {
        let too_long_label = "x".repeat(64);
        for name in ["", "-pool", "pool-", "pool_1", "a..b", "pool 1", too_long_label.as_str()] {
            assert!(
                matches!(validate_server_name(name), Err(TemplateError::InvalidName { .. })),
                "{name:?} should be rejected"
            );
        }
    }
}
