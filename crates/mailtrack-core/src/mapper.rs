//! Provider event mapping
//!
//! Pure translation from the upstream provider's event names to the
//! canonical vocabulary. Unknown names pass through unchanged so a new
//! provider event kind is preserved rather than dropped.

use mailtrack_common::types::EventKind;

/// Map a provider event name to a canonical event kind
pub fn map_provider_event(name: &str) -> EventKind {
    match name {
        "request" => EventKind::Sent,
        "delivered" => EventKind::Delivered,
        "hard_bounce" | "soft_bounce" => EventKind::Bounced,
        "blocked" => EventKind::Blocked,
        "spam" => EventKind::Spam,
        "complaint" => EventKind::Complaint,
        "unsubscribe" | "unsubscribed" => EventKind::Unsubscribed,
        "opened" => EventKind::Opened,
        "click" => EventKind::Clicked,
        "deferred" => EventKind::Deferred,
        // Canonical names map to themselves; anything else passes through
        other => EventKind::parse(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_provider_names() {
        assert_eq!(map_provider_event("request"), EventKind::Sent);
        assert_eq!(map_provider_event("delivered"), EventKind::Delivered);
        assert_eq!(map_provider_event("hard_bounce"), EventKind::Bounced);
        assert_eq!(map_provider_event("soft_bounce"), EventKind::Bounced);
        assert_eq!(map_provider_event("blocked"), EventKind::Blocked);
        assert_eq!(map_provider_event("spam"), EventKind::Spam);
        assert_eq!(map_provider_event("complaint"), EventKind::Complaint);
        assert_eq!(map_provider_event("unsubscribe"), EventKind::Unsubscribed);
        assert_eq!(map_provider_event("opened"), EventKind::Opened);
        assert_eq!(map_provider_event("click"), EventKind::Clicked);
        assert_eq!(map_provider_event("deferred"), EventKind::Deferred);
    }

    #[test]
    fn test_canonical_names_map_to_themselves() {
        assert_eq!(map_provider_event("sent"), EventKind::Sent);
        assert_eq!(map_provider_event("clicked"), EventKind::Clicked);
    }

    #[test]
    fn test_unknown_name_passes_through() {
        assert_eq!(
            map_provider_event("proxy_open"),
            EventKind::Other("proxy_open".to_string())
        );
    }
}
