//! EMQX admin API client.
//!
//! The admin credential is supplied externally and sent as basic auth on
//! every request. A non-2xx status is surfaced as an error; nothing is
//! retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AdminError;
use crate::protocol::{confirm_topic, device_topic};
use crate::types::DeviceType;

/// Built-in-database authentication users path of the EMQX v5 admin API.
const AUTH_USERS_PATH: &str = "/api/v5/authentication/password_based:built_in_database/users";

/// Built-in-database authorization rules path of the EMQX v5 admin API.
const ACL_RULES_PATH: &str = "/api/v5/authorization/sources/built_in_database/rules/users";

/// Action an ACL rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclAction {
    Publish,
    Subscribe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclPermission {
    Allow,
    Deny,
}

/// One publish/subscribe permission on a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclRule {
    pub action: AclAction,
    pub permission: AclPermission,
    pub topic: String,
}

/// Per-client rule set scoped to the device's private topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclPolicy {
    pub username: String,
    pub rules: Vec<AclRule>,
}

impl AclPolicy {
    /// Build the rule set for a freshly provisioned device.
    ///
    /// Every device subscribes to its private topic for commands. Publishing
    /// on the confirmation topic is allowed for sensors (they push telemetry)
    /// and denied for plain devices.
    pub fn for_device(client_id: &str, device_type: DeviceType) -> Self {
        let topic = device_topic(client_id);
        let publish = match device_type {
            DeviceType::Sensor => AclPermission::Allow,
            DeviceType::Device => AclPermission::Deny,
        };

        Self {
            username: client_id.to_string(),
            rules: vec![
                AclRule {
                    action: AclAction::Publish,
                    permission: publish,
                    topic: confirm_topic(&topic),
                },
                AclRule {
                    action: AclAction::Subscribe,
                    permission: AclPermission::Allow,
                    topic,
                },
            ],
        }
    }
}

/// Create/delete operations the registration saga needs from the broker.
#[async_trait]
pub trait BrokerAdmin: Send + Sync {
    async fn create_credential(&self, client_id: &str, password: &str) -> Result<(), AdminError>;

    async fn delete_credential(&self, client_id: &str) -> Result<(), AdminError>;

    async fn create_acl(&self, policy: &AclPolicy) -> Result<(), AdminError>;

    async fn delete_acl(&self, client_id: &str) -> Result<(), AdminError>;
}

/// EMQX v5 admin API client.
pub struct EmqxAdmin {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl EmqxAdmin {
    /// Create a client for the admin API at `base_url`.
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(action: &'static str, response: &reqwest::Response) -> Result<(), AdminError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AdminError::Api {
                action,
                status: response.status().as_u16(),
            })
        }
    }
}

#[async_trait]
impl BrokerAdmin for EmqxAdmin {
    async fn create_credential(&self, client_id: &str, password: &str) -> Result<(), AdminError> {
        let response = self
            .http
            .post(self.url(AUTH_USERS_PATH))
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({
                "user_id": client_id,
                "password": password,
            }))
            .send()
            .await?;

        Self::check("create credential", &response)
    }

    async fn delete_credential(&self, client_id: &str) -> Result<(), AdminError> {
        let response = self
            .http
            .delete(self.url(&format!("{}/{}", AUTH_USERS_PATH, client_id)))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        Self::check("delete credential", &response)
    }

    async fn create_acl(&self, policy: &AclPolicy) -> Result<(), AdminError> {
        // The rules endpoint takes a list of per-user policies.
        let response = self
            .http
            .post(self.url(ACL_RULES_PATH))
            .basic_auth(&self.username, Some(&self.password))
            .json(&[policy])
            .send()
            .await?;

        Self::check("create ACL rules", &response)
    }

    async fn delete_acl(&self, client_id: &str) -> Result<(), AdminError> {
        let response = self
            .http
            .delete(self.url(&format!("{}/{}", ACL_RULES_PATH, client_id)))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        Self::check("delete ACL rules", &response)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_may_publish_telemetry() {
        let policy = AclPolicy::for_device("64f1a2", DeviceType::Sensor);

        assert_eq!(policy.username, "64f1a2");
        assert_eq!(policy.rules[0].action, AclAction::Publish);
        assert_eq!(policy.rules[0].permission, AclPermission::Allow);
        assert_eq!(policy.rules[0].topic, "/devices/64f1a2/publish");
    }

    #[test]
    fn test_plain_device_may_not_publish() {
        let policy = AclPolicy::for_device("64f1a2", DeviceType::Device);

        assert_eq!(policy.rules[0].permission, AclPermission::Deny);
    }

    #[test]
    fn test_subscribe_always_allowed_on_private_topic() {
        for device_type in [DeviceType::Device, DeviceType::Sensor] {
            let policy = AclPolicy::for_device("64f1a2", device_type);
            assert_eq!(policy.rules[1].action, AclAction::Subscribe);
            assert_eq!(policy.rules[1].permission, AclPermission::Allow);
            assert_eq!(policy.rules[1].topic, "/devices/64f1a2");
        }
    }

    #[test]
    fn test_acl_rule_wire_format() {
        let policy = AclPolicy::for_device("64f1a2", DeviceType::Sensor);
        let raw = serde_json::to_value(&policy).unwrap();

        assert_eq!(raw["username"], "64f1a2");
        assert_eq!(raw["rules"][0]["action"], "publish");
        assert_eq!(raw["rules"][0]["permission"], "allow");
        assert_eq!(raw["rules"][1]["action"], "subscribe");
    }
}
