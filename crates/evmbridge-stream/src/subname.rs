//! Subscription name parsing.
//!
//! Listener subscriptions are named `<prefix>-sub-<namespace>-<id>`.
//! Names from before namespacing (`<prefix>-sub-<id>`, with no `-` in
//! the id) are still accepted and resolve to no single namespace.
//! Anything else is a hard error: an event from an unroutable
//! subscription must nack its frame rather than vanish.

use evmbridge_core::error::ConnectorError;

/// The parsed owner of a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSubscriptionName {
    /// `None` for legacy namespace-less names.
    pub namespace: Option<String>,
    pub listener_id: String,
}

/// Parse a subscription name against the configured prefix.
pub fn parse_subscription_name(
    prefix: &str,
    name: &str,
) -> Result<ParsedSubscriptionName, ConnectorError> {
    let unrecognized = || ConnectorError::SubscriptionName {
        name: name.to_string(),
    };

    let rest = name
        .strip_prefix(&format!("{prefix}-sub-"))
        .ok_or_else(unrecognized)?;
    if rest.is_empty() {
        return Err(unrecognized());
    }

    match rest.split_once('-') {
        Some((namespace, listener_id)) if !namespace.is_empty() && !listener_id.is_empty() => {
            Ok(ParsedSubscriptionName {
                namespace: Some(namespace.to_string()),
                listener_id: listener_id.to_string(),
            })
        }
        _ => Ok(ParsedSubscriptionName {
            namespace: None,
            listener_id: rest.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_form_with_uuid() {
        let parsed =
            parse_subscription_name("eb", "eb-sub-ns1-58113723-0cc3-411f-aa1b-948eca83b9cd")
                .unwrap();
        assert_eq!(parsed.namespace.as_deref(), Some("ns1"));
        assert_eq!(parsed.listener_id, "58113723-0cc3-411f-aa1b-948eca83b9cd");
    }

    #[test]
    fn legacy_form_has_no_namespace() {
        let parsed = parse_subscription_name("eb", "eb-sub-1132312312312").unwrap();
        assert_eq!(parsed.namespace, None);
        assert_eq!(parsed.listener_id, "1132312312312");
    }

    #[test]
    fn unrecognized_names_are_hard_errors() {
        assert!(parse_subscription_name("eb", "BatchPin").is_err());
        assert!(parse_subscription_name("eb", "something-else").is_err());
        assert!(parse_subscription_name("eb", "eb-sub-").is_err());
    }
}
