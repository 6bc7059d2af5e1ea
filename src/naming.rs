//! Deterministic naming rules shared by contexts and blob names.

/// Keep only ASCII alphanumeric characters
pub fn alphanumeric(input: &str) -> String {
    input.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Lowercase and keep only ASCII alphanumerics and hyphens.
///
/// Used for SRE keys and per-SRE blob names, so that `"SRE One"` and
/// `"sreone"` refer to the same environment.
pub fn sanitise_sre_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// First `max` characters of an ASCII string
pub fn truncate(input: &str, max: usize) -> &str {
    match input.char_indices().nth(max) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphanumeric() {
        assert_eq!(alphanumeric("Acme Deployment!"), "AcmeDeployment");
    }

    #[test]
    fn test_sanitise_sre_name() {
        assert_eq!(sanitise_sre_name("SRE One"), "sreone");
        assert_eq!(sanitise_sre_name("Project-X_2"), "project-x2");
        assert_eq!(sanitise_sre_name("sre1"), "sre1");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("acmedeployment", 9), "acmedeplo");
        assert_eq!(truncate("short", 9), "short");
    }
}
