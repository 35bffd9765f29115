//! Topic naming convention for the broker command channel.

/// Prefix of every per-device private topic.
const DEVICE_TOPIC_PREFIX: &str = "/devices";

/// Private topic of a device; commands are published here.
pub fn device_topic(client_id: &str) -> String {
    format!("{}/{}", DEVICE_TOPIC_PREFIX, client_id)
}

/// Reply topic for a device topic; confirmations come back here.
pub fn confirm_topic(topic: &str) -> String {
    format!("{}/publish", topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_topic() {
        assert_eq!(device_topic("64f1a2"), "/devices/64f1a2");
    }

    #[test]
    fn test_confirm_topic() {
        assert_eq!(confirm_topic("/devices/64f1a2"), "/devices/64f1a2/publish");
    }
}
