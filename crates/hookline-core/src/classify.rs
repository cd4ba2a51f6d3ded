//! Identifier format classification.
//!
//! Every event carries an optional user identifier and an optional anonymous
//! identifier. Each is assigned exactly one [`IdFormat`] category. The
//! categories are mutually exclusive and the evaluation order is a contract:
//! purely numeric legacy identifiers must be recognized as `social_user`
//! *before* the guid-shaped checks run, otherwise they fall through to
//! `invalid` and trigger false alerts.
//!
//! # Fake GUIDs
//!
//! A known client-side ID-generation bug produces strings shaped like GUIDs
//! but with every dash-separated group exactly 4 characters long (a real GUID
//! groups as 8-4-4-4-12). These are classified `fake_guid` and tracked for
//! manual reconciliation rather than rejected outright.

use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;
use crate::event::WebhookPayload;

/// Format category assigned to a raw identifier string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFormat {
    /// Identifier is absent or empty. No alert implications.
    Blank,
    /// Canonical 8-4-4-4-12 hex GUID, optionally `r:`-prefixed; for the
    /// anonymous field also `e:<hex>` (email-derived synthetic ID).
    Guid,
    /// Dash-separated groups of exactly 4 characters each. A known-bad
    /// shape produced by a buggy upstream client.
    FakeGuid,
    /// Purely numeric legacy identifier. Valid despite not being a GUID.
    SocialUser,
    /// None of the recognized shapes matched.
    Invalid,
}

/// Which identifier field a raw value came from. The anonymous field accepts
/// one extra shape (`e:<hex>`) that the user field does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// The `userId` field.
    User,
    /// The `anonymousId` field.
    Anonymous,
}

impl IdFormat {
    /// Classify a raw identifier string.
    ///
    /// Evaluation order is significant and test-covered:
    /// blank, social_user, fake_guid, guid, invalid.
    pub fn classify(raw: Option<&str>, kind: IdKind) -> Self {
        let id = match raw {
            Some(id) if !id.is_empty() => id,
            _ => return Self::Blank,
        };

        // Numeric legacy IDs first: they must never fall through to the
        // guid-shaped checks.
        if id.bytes().all(|b| b.is_ascii_digit()) {
            return Self::SocialUser;
        }

        if is_fake_guid(id) {
            return Self::FakeGuid;
        }

        if is_guid(id) {
            return Self::Guid;
        }

        if kind == IdKind::Anonymous && is_email_generated_guid(id) {
            return Self::Guid;
        }

        Self::Invalid
    }

    /// Category name as used in metric tag values and error codes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blank => "blank",
            Self::Guid => "guid",
            Self::FakeGuid => "fake_guid",
            Self::SocialUser => "social_user",
            Self::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for IdFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every dash-separated group is exactly 4 characters.
fn is_fake_guid(id: &str) -> bool {
    id.split('-').all(|group| group.len() == 4)
}

/// Canonical 8-4-4-4-12 hex GUID, optionally prefixed with `r:`.
fn is_guid(id: &str) -> bool {
    let id = id.strip_prefix("r:").unwrap_or(id);

    const GROUP_LENGTHS: [usize; 5] = [8, 4, 4, 4, 12];

    let mut groups = id.split('-');
    for expected in GROUP_LENGTHS {
        match groups.next() {
            Some(g) if g.len() == expected && g.bytes().all(|b| b.is_ascii_hexdigit()) => {}
            _ => return false,
        }
    }
    groups.next().is_none()
}

/// `e:` followed by one or more hex characters: an anonymous ID synthesized
/// from a hashed email address.
fn is_email_generated_guid(id: &str) -> bool {
    match id.strip_prefix("e:") {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Per-event classification report
// ═══════════════════════════════════════════════════════════════════════════

/// Error code emitted when the user identifier is unclassifiable.
pub const USER_ID_INVALID: &str = "event.user_id.invalid";
/// Error code emitted for an unreconciled fake-guid user identifier.
pub const USER_ID_FAKE_GUID: &str = "event.user_id.fake_guid";
/// Error code emitted when the anonymous identifier is unclassifiable.
pub const ANONYMOUS_ID_INVALID: &str = "event.anonymous_id.invalid";
/// Error code emitted for a fake-guid anonymous identifier.
pub const ANONYMOUS_ID_FAKE_GUID: &str = "event.anonymous_id.fake_guid";

/// Classification of both identifier fields of a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdReport {
    /// Format of the `userId` field.
    pub user_id_format: IdFormat,
    /// Format of the `anonymousId` field.
    pub anonymous_id_format: IdFormat,
}

impl IdReport {
    /// Classify both identifier fields of a payload.
    pub fn from_payload(payload: &WebhookPayload) -> Self {
        Self {
            user_id_format: IdFormat::classify(payload.user_id(), IdKind::User),
            anonymous_id_format: IdFormat::classify(payload.anonymous_id(), IdKind::Anonymous),
        }
    }

    /// Ordered error codes for every failing condition.
    ///
    /// `user_id_suppressed` is true when the fake-guid user identifier has
    /// been reconciled to a canonical ID (or is on the startup exclusion
    /// list); a reconciled fake guid no longer alerts, even though its raw
    /// shape is still reported in metric tags.
    pub fn error_codes(&self, user_id_suppressed: bool) -> Vec<&'static str> {
        let mut codes = Vec::new();
        if self.user_id_format == IdFormat::Invalid {
            codes.push(USER_ID_INVALID);
        }
        if self.user_id_format == IdFormat::FakeGuid && !user_id_suppressed {
            codes.push(USER_ID_FAKE_GUID);
        }
        if self.anonymous_id_format == IdFormat::Invalid {
            codes.push(ANONYMOUS_ID_INVALID);
        }
        if self.anonymous_id_format == IdFormat::FakeGuid {
            codes.push(ANONYMOUS_ID_FAKE_GUID);
        }
        codes
    }

    /// An event is valid iff no error code applies.
    pub fn is_valid(&self, user_id_suppressed: bool) -> bool {
        self.error_codes(user_id_suppressed).is_empty()
    }
}

/// Load the known-bad identifier exclusion list from a newline-delimited
/// file. Blank lines and `#` comment lines are skipped.
///
/// Identifiers on this list are treated like reconciled aliases: they are
/// still tagged by raw shape in metrics but never alert.
pub fn load_exclusion_list<P: AsRef<Path>>(path: P) -> Result<HashSet<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_user(id: &str) -> IdFormat {
        IdFormat::classify(Some(id), IdKind::User)
    }

    fn classify_anonymous(id: &str) -> IdFormat {
        IdFormat::classify(Some(id), IdKind::Anonymous)
    }

    // =========================================================================
    // Category assignment
    // =========================================================================

    #[test]
    fn test_absent_id_is_blank() {
        assert_eq!(IdFormat::classify(None, IdKind::User), IdFormat::Blank);
    }

    #[test]
    fn test_empty_id_is_blank() {
        assert_eq!(classify_user(""), IdFormat::Blank);
    }

    #[test]
    fn test_numeric_id_is_social_user() {
        assert_eq!(classify_user("2638327"), IdFormat::SocialUser);
        assert_eq!(classify_user("1"), IdFormat::SocialUser);
    }

    #[test]
    fn test_canonical_guid() {
        assert_eq!(
            classify_user("97cfe16b-551a-4ddc-89d0-1c5b1ccb4ea0"),
            IdFormat::Guid
        );
    }

    #[test]
    fn test_prefixed_guid() {
        assert_eq!(
            classify_user("r:97cfe16b-551a-4ddc-89d0-1c5b1ccb4ea0"),
            IdFormat::Guid
        );
    }

    #[test]
    fn test_uppercase_hex_guid() {
        assert_eq!(
            classify_user("97CFE16B-551A-4DDC-89D0-1C5B1CCB4EA0"),
            IdFormat::Guid
        );
    }

    #[test]
    fn test_fake_guid_groups_of_four() {
        assert_eq!(classify_user("abcd-efgh-efgh-ijkl-mnop"), IdFormat::FakeGuid);
    }

    #[test]
    fn test_email_generated_guid_anonymous_only() {
        assert_eq!(
            classify_anonymous("e:17553f63c18b41739a10"),
            IdFormat::Guid
        );
        // The same shape in the user field is not a recognized GUID.
        assert_eq!(classify_user("e:17553f63c18b41739a10"), IdFormat::Invalid);
    }

    #[test]
    fn test_email_generated_guid_requires_hex() {
        assert_eq!(classify_anonymous("e:"), IdFormat::Invalid);
        assert_eq!(classify_anonymous("e:xyz"), IdFormat::Invalid);
    }

    #[test]
    fn test_unknown_shape_is_invalid() {
        assert_eq!(classify_user("not-a-known-shape"), IdFormat::Invalid);
    }

    #[test]
    fn test_guid_with_wrong_grouping_is_invalid() {
        assert_eq!(
            classify_user("97cfe16b-551a-4ddc-89d0-1c5b1ccb4ea0-ffff"),
            IdFormat::Invalid
        );
        assert_eq!(classify_user("97cfe16b-551a-4ddc-89d0"), IdFormat::Invalid);
    }

    #[test]
    fn test_non_hex_guid_shape_is_invalid() {
        assert_eq!(
            classify_user("97cfe16z-551a-4ddc-89d0-1c5b1ccb4ea0"),
            IdFormat::Invalid
        );
    }

    // Precedence is a contract, not a style choice: a purely numeric ID of
    // four digits also matches the fake-guid shape, and must win as
    // social_user.
    #[test]
    fn test_numeric_id_wins_over_fake_guid_shape() {
        assert_eq!(classify_user("1234"), IdFormat::SocialUser);
    }

    #[test]
    fn test_every_id_gets_exactly_one_category() {
        let samples = [
            "",
            "2638327",
            "97cfe16b-551a-4ddc-89d0-1c5b1ccb4ea0",
            "abcd-efgh-efgh-ijkl-mnop",
            "e:17553f63c18b41739a10",
            "not-a-known-shape",
            "r:97cfe16b-551a-4ddc-89d0-1c5b1ccb4ea0",
        ];
        for id in samples {
            for kind in [IdKind::User, IdKind::Anonymous] {
                // classify is total: every input maps to one category
                let _ = IdFormat::classify(Some(id), kind);
            }
        }
    }

    #[test]
    fn test_category_names() {
        assert_eq!(IdFormat::Blank.as_str(), "blank");
        assert_eq!(IdFormat::Guid.as_str(), "guid");
        assert_eq!(IdFormat::FakeGuid.as_str(), "fake_guid");
        assert_eq!(IdFormat::SocialUser.as_str(), "social_user");
        assert_eq!(IdFormat::Invalid.as_str(), "invalid");
    }

    // =========================================================================
    // Event-level report
    // =========================================================================

    fn report(user: &str, anonymous: &str) -> IdReport {
        IdReport {
            user_id_format: classify_user(user),
            anonymous_id_format: classify_anonymous(anonymous),
        }
    }

    #[test]
    fn test_well_formed_event_has_no_error_codes() {
        let r = report("2638327", "97cfe16b-551a-4ddc-89d0-1c5b1ccb4ea0");
        assert!(r.error_codes(false).is_empty());
        assert!(r.is_valid(false));
    }

    #[test]
    fn test_error_codes_are_ordered() {
        let r = report("not-a-known-shape!", "abcd-efgh-ijkl-mnop");
        assert_eq!(
            r.error_codes(false),
            vec![USER_ID_INVALID, ANONYMOUS_ID_FAKE_GUID]
        );
        assert!(!r.is_valid(false));
    }

    #[test]
    fn test_fake_guid_user_id_alerts_until_suppressed() {
        let r = report("abcd-efgh-efgh-ijkl-mnop", "");
        assert_eq!(r.error_codes(false), vec![USER_ID_FAKE_GUID]);
        assert!(r.error_codes(true).is_empty());
    }

    #[test]
    fn test_anonymous_fake_guid_has_no_suppression() {
        let r = report("", "abcd-efgh-efgh-ijkl-mnop");
        assert_eq!(r.error_codes(true), vec![ANONYMOUS_ID_FAKE_GUID]);
    }

    #[test]
    fn test_blank_ids_are_valid() {
        let r = report("", "");
        assert!(r.is_valid(false));
    }

    // =========================================================================
    // Exclusion list loading
    // =========================================================================

    #[test]
    fn test_load_exclusion_list() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# known-bad identifiers").unwrap();
        writeln!(file, "abcd-efgh-efgh-ijkl-mnop").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  wxyz-wxyz-wxyz-wxyz  ").unwrap();

        let set = load_exclusion_list(file.path()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("abcd-efgh-efgh-ijkl-mnop"));
        assert!(set.contains("wxyz-wxyz-wxyz-wxyz"));
    }

    #[test]
    fn test_load_exclusion_list_missing_file() {
        assert!(load_exclusion_list("/nonexistent/exclusions.txt").is_err());
    }
}
