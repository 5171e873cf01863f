//! Parsers for the line-oriented output of `security`

use crate::path::KeychainPath;

/// Keychains in the order the tool reported them
pub type KeychainList = Vec<KeychainPath>;

/// Parse `list-keychains` / `default-keychain` / `login-keychain` output
///
/// One keychain per non-blank line, surrounding whitespace and double
/// quotes stripped, output order preserved.
///
/// Input: `    "/Users/ci/Library/Keychains/login.keychain-db"`
/// Output: `["/Users/ci/Library/Keychains/login.keychain-db"]`
#[must_use]
pub fn parse_keychain_list(stdout: &str) -> KeychainList {
    stdout
        .lines()
        .map(|line| line.trim().trim_matches('"').trim())
        .filter(|line| !line.is_empty())
        .map(KeychainPath::from)
        .collect()
}

/// A code-signing identity reported by `find-identity`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    /// SHA-1 hash of the certificate, hex encoded
    pub hash: String,
    /// Common name, e.g. `Apple Development: Jane Doe (TEAM123)`
    pub name: String,
}

/// Parse `find-identity -p codesigning -v` output
///
/// Format: `  1) 0123ABCD... "Developer ID Application: Acme Corp (TEAM123)"`.
/// The trailing `N valid identities found` summary and policy headers
/// are skipped.
#[must_use]
pub fn parse_signing_identities(stdout: &str) -> Vec<SigningIdentity> {
    let mut identities = Vec::new();

    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.contains("valid identities found") {
            continue;
        }

        let Some((index, rest)) = trimmed.split_once(") ") else {
            continue;
        };
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let Some((hash, rest)) = rest.trim_start().split_once(char::is_whitespace) else {
            continue;
        };

        if let Some(start) = rest.find('"')
            && let Some(end) = rest[start + 1..].find('"')
        {
            identities.push(SigningIdentity {
                hash: hash.to_string(),
                name: rest[start + 1..start + 1 + end].to_string(),
            });
        }
    }

    identities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(list: &[KeychainPath]) -> Vec<&str> {
        list.iter().map(KeychainPath::as_str).collect()
    }

    #[test]
    fn quotes_stripped_and_blank_lines_dropped() {
        let list = parse_keychain_list("\"A\"\n\"B\"\n\n\"C\"\n");
        assert_eq!(strings(&list), vec!["A", "B", "C"]);
    }

    #[test]
    fn indented_tool_output() {
        let stdout = "    \"/Users/ci/Library/Keychains/login.keychain-db\"\n    \"/Library/Keychains/System.keychain\"\n";
        let list = parse_keychain_list(stdout);
        assert_eq!(
            strings(&list),
            vec![
                "/Users/ci/Library/Keychains/login.keychain-db",
                "/Library/Keychains/System.keychain",
            ]
        );
    }

    #[test]
    fn unquoted_lines_are_kept() {
        let list = parse_keychain_list("/tmp/a.keychain-db\r\n  \r\n");
        assert_eq!(strings(&list), vec!["/tmp/a.keychain-db"]);
    }

    #[test]
    fn empty_output_is_empty_list() {
        assert!(parse_keychain_list("").is_empty());
        assert!(parse_keychain_list("\n\n   \n").is_empty());
    }

    #[test]
    fn signing_identities_parsed_in_order() {
        let stdout = "  1) 0123456789ABCDEF0123456789ABCDEF01234567 \"Apple Development: Jane Doe (TEAM123)\"\n\
                      \x20 2) FEDCBA9876543210FEDCBA9876543210FEDCBA98 \"Developer ID Application: Acme Corp (TEAM456)\"\n\
                      \x20    2 valid identities found\n";
        let identities = parse_signing_identities(stdout);
        assert_eq!(
            identities,
            vec![
                SigningIdentity {
                    hash: "0123456789ABCDEF0123456789ABCDEF01234567".to_string(),
                    name: "Apple Development: Jane Doe (TEAM123)".to_string(),
                },
                SigningIdentity {
                    hash: "FEDCBA9876543210FEDCBA9876543210FEDCBA98".to_string(),
                    name: "Developer ID Application: Acme Corp (TEAM456)".to_string(),
                },
            ]
        );
    }

    #[test]
    fn headers_and_summary_yield_nothing() {
        let stdout = "Policy: Code Signing\n  Matching identities\n     0 valid identities found\n";
        assert!(parse_signing_identities(stdout).is_empty());
    }
}
