//! Security challenge detection.

/// Phrases that only appear on anti-bot or account-verification interstitials.
/// Matching is case-insensitive substring search.
pub const SECURITY_PATTERNS: &[&str] = &[
    "unusual login",
    "new login",
    "security check",
    "verify your account",
    "suspicious activity",
    "please review",
    "checkpoint required",
    "confirm your identity",
    "confirm it's you",
    "checkpoint",
];

/// True when `text` looks like a security challenge rather than real content.
pub fn is_checkpoint(text: &str) -> bool {
    let lower = text.to_lowercase();
    SECURITY_PATTERNS.iter().any(|p| lower.contains(p))
}
