//! Effective "optimized" flag for generate requests

/// Explicit toggle forces optimized mode on. With the toggle off, the
/// mode follows whether anything has been rated this session, so once
/// ratings exist there is no way to turn it back off.
pub fn resolve(explicit_toggle: bool, has_rated: bool) -> bool
{   explicit_toggle || has_rated
}
