// Availability diagnostics - classifies why a video cannot be fetched
//
// Analyzes yt-dlp error output to determine:
// - Why the candidate is unavailable (deleted, private, region lock, ...)
// - Whether the condition is platform-permanent or transient
//
// Classification is observability-only: the selection policy consumes a
// plain present/absent signal and never branches on the reason.

use serde::{Deserialize, Serialize};

/// Reasons a candidate can be unavailable for download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnavailableReason {
    /// Removed by the uploader or the platform
    Deleted,

    /// Private video requiring authorization
    Private,

    /// Not viewable from this region
    RegionLocked,

    /// Age gate requiring a signed-in session
    AgeRestricted,

    /// Members/subscriber gate
    MembersOnly,

    /// Rate limiting (429 or similar)
    RateLimited,

    /// Bot detection triggered
    BotDetection,

    /// Network timeout (possible throttling)
    NetworkTimeout,

    /// Generic/unknown cause
    Unknown,
}

impl UnavailableReason {
    /// Platform-permanent conditions: retrying the same video is pointless,
    /// falling back across other candidates is the right move.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Deleted | Self::Private | Self::RegionLocked | Self::MembersOnly
        )
    }

    /// Conditions that may clear on a later polling cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::BotDetection | Self::NetworkTimeout | Self::Unknown
        )
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Deleted => "Video unavailable (removed or never existed)",
            Self::Private => "Private video",
            Self::RegionLocked => "Not available in this region",
            Self::AgeRestricted => "Age-restricted content",
            Self::MembersOnly => "Members-only content",
            Self::RateLimited => "Rate limited by the platform",
            Self::BotDetection => "Bot detection triggered",
            Self::NetworkTimeout => "Network timeout (possible throttling)",
            Self::Unknown => "Unknown availability failure",
        }
    }
}

/// Analyze yt-dlp error output and classify the availability failure.
/// Returns None for an empty error string.
pub fn classify_unavailable(error: &str) -> Option<UnavailableReason> {
    let lower = error.to_lowercase();

    // Check patterns in order of specificity

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return Some(UnavailableReason::Private);
    }

    if lower.contains("not available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geographic restriction")
        || lower.contains("this video is not available")
    {
        return Some(UnavailableReason::RegionLocked);
    }

    if lower.contains("age-restricted")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age_verification")
    {
        return Some(UnavailableReason::AgeRestricted);
    }

    if lower.contains("members only")
        || lower.contains("members-only")
        || lower.contains("join this channel")
        || lower.contains("membership required")
    {
        return Some(UnavailableReason::MembersOnly);
    }

    if lower.contains("video unavailable")
        || lower.contains("video has been removed")
        || lower.contains("no longer available")
        || lower.contains("video is unavailable")
    {
        return Some(UnavailableReason::Deleted);
    }

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
    {
        return Some(UnavailableReason::RateLimited);
    }

    if lower.contains("bot")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
        || lower.contains("automated")
    {
        return Some(UnavailableReason::BotDetection);
    }

    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection refused")
        || lower.contains("network unreachable")
    {
        return Some(UnavailableReason::NetworkTimeout);
    }

    if !error.is_empty() {
        return Some(UnavailableReason::Unknown);
    }

    None
}

/// First actionable line from yt-dlp stderr, for log context.
pub fn error_context(error: &str) -> Option<String> {
    error
        .lines()
        .find(|line| {
            let l = line.trim().to_lowercase();
            l.starts_with("error:") || l.contains("unavailable") || l.contains("private")
        })
        .map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_detection() {
        let error = "ERROR: [youtube] abc123: Video unavailable";
        assert_eq!(classify_unavailable(error), Some(UnavailableReason::Deleted));
    }

    #[test]
    fn test_private_detection() {
        let error = "ERROR: Private video. Sign in if you've been granted access";
        assert_eq!(classify_unavailable(error), Some(UnavailableReason::Private));
    }

    #[test]
    fn test_region_detection() {
        let error = "This video is not available in your country";
        // Region patterns win over the generic "not available" ones
        assert_eq!(
            classify_unavailable(error),
            Some(UnavailableReason::RegionLocked)
        );
    }

    #[test]
    fn test_age_restriction_detection() {
        let error = "Sign in to confirm your age";
        assert_eq!(
            classify_unavailable(error),
            Some(UnavailableReason::AgeRestricted)
        );
    }

    #[test]
    fn test_members_only_detection() {
        let error = "Join this channel to get access to members-only content";
        assert_eq!(
            classify_unavailable(error),
            Some(UnavailableReason::MembersOnly)
        );
    }

    #[test]
    fn test_rate_limit_detection() {
        let error = "HTTP Error 429: Too Many Requests";
        assert_eq!(
            classify_unavailable(error),
            Some(UnavailableReason::RateLimited)
        );
    }

    #[test]
    fn test_timeout_detection() {
        let error = "Timed out after 30s";
        assert_eq!(
            classify_unavailable(error),
            Some(UnavailableReason::NetworkTimeout)
        );
    }

    #[test]
    fn test_unknown_detection() {
        let error = "some other yt-dlp failure";
        assert_eq!(classify_unavailable(error), Some(UnavailableReason::Unknown));
    }

    #[test]
    fn test_empty_error_yields_none() {
        assert_eq!(classify_unavailable(""), None);
    }

    #[test]
    fn test_permanence() {
        assert!(UnavailableReason::Deleted.is_permanent());
        assert!(UnavailableReason::Private.is_permanent());
        assert!(!UnavailableReason::RateLimited.is_permanent());
        assert!(UnavailableReason::RateLimited.is_transient());
    }

    #[test]
    fn test_error_context_picks_error_line() {
        let stderr = "WARNING: something minor\nERROR: Video unavailable\nmore noise";
        assert_eq!(
            error_context(stderr).as_deref(),
            Some("ERROR: Video unavailable")
        );
    }
}
