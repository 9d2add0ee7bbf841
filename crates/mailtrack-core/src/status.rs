//! Status derivation
//!
//! Computes the single current status of an email from the set of event
//! kinds it has accumulated. Evaluated by set membership in a fixed
//! priority order, never by timestamps, so out-of-order and replayed
//! deliveries converge to the same result.

use mailtrack_common::types::EventKind;

/// Derive the current status from the accumulated event kinds.
///
/// Priority, highest wins: clicked > opened > delivered > bounced >
/// unsubscribed, falling back to sent. A later, lower-priority event can
/// never downgrade the status.
pub fn derive_status(kinds: &[EventKind]) -> EventKind {
    let priority = [
        EventKind::Clicked,
        EventKind::Opened,
        EventKind::Delivered,
        EventKind::Bounced,
        EventKind::Unsubscribed,
    ];

    for candidate in priority {
        if kinds.contains(&candidate) {
            return candidate;
        }
    }

    EventKind::Sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_priority_table() {
        assert_eq!(
            derive_status(&[EventKind::Sent, EventKind::Delivered, EventKind::Opened]),
            EventKind::Opened
        );
        assert_eq!(
            derive_status(&[EventKind::Sent, EventKind::Bounced]),
            EventKind::Bounced
        );
        assert_eq!(
            derive_status(&[
                EventKind::Sent,
                EventKind::Delivered,
                EventKind::Bounced,
                EventKind::Clicked
            ]),
            EventKind::Clicked
        );
    }

    #[test]
    fn test_fallback_is_sent() {
        assert_eq!(derive_status(&[EventKind::Sent]), EventKind::Sent);
        assert_eq!(derive_status(&[]), EventKind::Sent);
        assert_eq!(
            derive_status(&[EventKind::Deferred, EventKind::Blocked]),
            EventKind::Sent
        );
    }

    #[test]
    fn test_order_independent() {
        let forward = [EventKind::Sent, EventKind::Bounced, EventKind::Delivered];
        let mut reverse = forward.clone();
        reverse.reverse();
        assert_eq!(derive_status(&forward), derive_status(&reverse));
        assert_eq!(derive_status(&forward), EventKind::Delivered);
    }

    #[test]
    fn test_unmapped_kinds_do_not_affect_status() {
        assert_eq!(
            derive_status(&[
                EventKind::Sent,
                EventKind::Other("proxy_open".to_string()),
                EventKind::Delivered
            ]),
            EventKind::Delivered
        );
    }
}
