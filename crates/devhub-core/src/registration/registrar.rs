//! The registration saga.
//!
//! Strictly sequential steps, each gated by the previous step's success:
//! persist the device record, create the broker credential, create the ACL
//! policy. A step failure compensates every already-committed step in
//! reverse order before the error is surfaced; compensation failures are
//! collected so the caller can name exactly which resources leaked.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::broker::{AclPolicy, BrokerAdmin};
use crate::error::{
    OrphanedResource, RegistrationError, RegistrationStep, RollbackError,
};
use crate::protocol::{device_topic, CredentialPayload};
use crate::store::DeviceStore;
use crate::types::{DeviceSpecification, NewDevice};

use super::password::{generate_password, DEFAULT_PASSWORD_LEN};

/// Runs the registration saga against explicit store and broker-admin
/// collaborators.
pub struct Registrar {
    store: Arc<dyn DeviceStore>,
    admin: Arc<dyn BrokerAdmin>,
    broker_host: String,
    broker_port: u16,
    password_len: usize,
}

impl Registrar {
    /// Create a registrar. `broker_host` and `broker_port` name the broker
    /// endpoint handed to devices, not the admin API.
    pub fn new(
        store: Arc<dyn DeviceStore>,
        admin: Arc<dyn BrokerAdmin>,
        broker_host: impl Into<String>,
        broker_port: u16,
    ) -> Self {
        Self {
            store,
            admin,
            broker_host: broker_host.into(),
            broker_port,
            password_len: DEFAULT_PASSWORD_LEN,
        }
    }

    /// Override the generated password length.
    pub fn with_password_len(mut self, len: usize) -> Self {
        self.password_len = len;
        self
    }

    /// Run the saga for a device specification.
    ///
    /// On success the returned payload carries everything the device needs
    /// to reach its private topic.
    pub async fn register(
        &self,
        spec: &DeviceSpecification,
    ) -> Result<CredentialPayload, RegistrationError> {
        spec.validate()?;

        // Step 1: persist the record; the store assigns the client id.
        let client_id = self
            .store
            .insert(NewDevice::from_specification(spec))
            .await
            .map_err(|e| RegistrationError::Step {
                step: RegistrationStep::DeviceRecord,
                cause: e.to_string(),
            })?;
        info!("persisted device record {} for `{}`", client_id, spec.name);

        // Step 2: broker credential with clientId = record id.
        let password = generate_password(self.password_len);
        if let Err(e) = self.admin.create_credential(&client_id, &password).await {
            let rollback = self
                .compensate(&client_id, &[RegistrationStep::DeviceRecord])
                .await;
            return Err(step_failure(
                RegistrationStep::BrokerCredential,
                e.to_string(),
                rollback,
            ));
        }

        // Step 3: ACL policy tied 1:1 to the credential.
        let policy = AclPolicy::for_device(&client_id, spec.device_type);
        if let Err(e) = self.admin.create_acl(&policy).await {
            let rollback = self
                .compensate(
                    &client_id,
                    &[
                        RegistrationStep::BrokerCredential,
                        RegistrationStep::DeviceRecord,
                    ],
                )
                .await;
            return Err(step_failure(
                RegistrationStep::AclPolicy,
                e.to_string(),
                rollback,
            ));
        }

        info!("device {} fully provisioned", client_id);

        Ok(CredentialPayload {
            host: self.broker_host.clone(),
            port: self.broker_port,
            client_id: client_id.clone(),
            password,
            topic: device_topic(&client_id),
        })
    }

    /// Undo a fully provisioned registration: ACL, credential, record.
    ///
    /// Used when a device backs out after provisioning and for explicit
    /// removal.
    pub async fn rollback(&self, client_id: &str) -> Result<(), RollbackError> {
        warn!("rolling back registration of device {}", client_id);
        match self
            .compensate(
                client_id,
                &[
                    RegistrationStep::AclPolicy,
                    RegistrationStep::BrokerCredential,
                    RegistrationStep::DeviceRecord,
                ],
            )
            .await
        {
            None => Ok(()),
            Some(rollback) => Err(rollback),
        }
    }

    /// Run compensations in the given order.
    ///
    /// Every compensation is attempted even when an earlier one fails; the
    /// failures are collected into a `RollbackError` naming the orphans.
    async fn compensate(
        &self,
        client_id: &str,
        steps: &[RegistrationStep],
    ) -> Option<RollbackError> {
        let mut orphaned = Vec::new();

        for step in steps {
            let result = match step {
                RegistrationStep::DeviceRecord => self
                    .store
                    .delete(client_id)
                    .await
                    .map_err(|e| e.to_string()),
                RegistrationStep::BrokerCredential => self
                    .admin
                    .delete_credential(client_id)
                    .await
                    .map_err(|e| e.to_string()),
                RegistrationStep::AclPolicy => self
                    .admin
                    .delete_acl(client_id)
                    .await
                    .map_err(|e| e.to_string()),
            };

            if let Err(cause) = result {
                error!(
                    "compensation for {} of device {} failed: {}",
                    step, client_id, cause
                );
                orphaned.push(OrphanedResource {
                    resource: *step,
                    cause,
                });
            }
        }

        if orphaned.is_empty() {
            None
        } else {
            Some(RollbackError {
                client_id: client_id.to_string(),
                orphaned,
            })
        }
    }
}

fn step_failure(
    step: RegistrationStep,
    cause: String,
    rollback: Option<RollbackError>,
) -> RegistrationError {
    match rollback {
        None => RegistrationError::Step { step, cause },
        Some(rollback) => RegistrationError::StepUnrecovered {
            step,
            cause,
            rollback,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use crate::broker::admin::testing::RecordingAdmin;
    use crate::store::testing::MemoryStore;
    use crate::types::{DeviceSpecification, DeviceType, FieldSpec, FieldType, ResponseEndpoint};

    use super::*;

    fn make_spec() -> DeviceSpecification {
        DeviceSpecification {
            name: "thermostat".to_string(),
            device_type: DeviceType::Sensor,
            fields: vec![FieldSpec {
                name: "temperature".to_string(),
                field_type: FieldType::Float,
                min: Some(0.0),
                max: Some(100.0),
            }],
            response_endpoint: ResponseEndpoint {
                address: "192.168.1.50".to_string(),
                port: 9000,
            },
        }
    }

    fn make_registrar(
        store: Arc<MemoryStore>,
        admin: Arc<RecordingAdmin>,
    ) -> Registrar {
        Registrar::new(store, admin, "192.168.1.10", 1883)
    }

    #[tokio::test]
    async fn test_successful_registration() {
        let store = Arc::new(MemoryStore::new());
        let admin = Arc::new(RecordingAdmin::new());
        let registrar = make_registrar(store.clone(), admin.clone());

        let credentials = registrar.register(&make_spec()).await.unwrap();

        assert_eq!(credentials.host, "192.168.1.10");
        assert_eq!(credentials.port, 1883);
        assert_eq!(credentials.password.len(), 20);
        assert_eq!(
            credentials.topic,
            format!("/devices/{}", credentials.client_id)
        );

        assert_eq!(store.device_count(), 1);
        assert!(admin
            .credentials
            .lock()
            .unwrap()
            .contains(&credentials.client_id));
        assert!(admin.acls.lock().unwrap().contains_key(&credentials.client_id));
    }

    #[tokio::test]
    async fn test_invalid_spec_touches_nothing() {
        let store = Arc::new(MemoryStore::new());
        let admin = Arc::new(RecordingAdmin::new());
        let registrar = make_registrar(store.clone(), admin.clone());

        let mut spec = make_spec();
        spec.fields[0].min = None;

        let err = registrar.register(&spec).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Specification(_)));
        assert_eq!(store.device_count(), 0);
        assert!(admin.credentials.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credential_failure_deletes_record() {
        let store = Arc::new(MemoryStore::new());
        let admin = Arc::new(RecordingAdmin::new());
        admin.fail_create_credential.store(true, Ordering::SeqCst);
        let registrar = make_registrar(store.clone(), admin.clone());

        let err = registrar.register(&make_spec()).await.unwrap_err();

        assert_eq!(err.failed_step(), Some(RegistrationStep::BrokerCredential));
        assert_eq!(store.device_count(), 0);
        assert!(admin.acls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acl_failure_deletes_credential_and_record() {
        let store = Arc::new(MemoryStore::new());
        let admin = Arc::new(RecordingAdmin::new());
        admin.fail_create_acl.store(true, Ordering::SeqCst);
        let registrar = make_registrar(store.clone(), admin.clone());

        let err = registrar.register(&make_spec()).await.unwrap_err();

        assert_eq!(err.failed_step(), Some(RegistrationStep::AclPolicy));
        assert_eq!(store.device_count(), 0);
        assert!(admin.credentials.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_compensation_names_orphans() {
        let store = Arc::new(MemoryStore::new());
        let admin = Arc::new(RecordingAdmin::new());
        admin.fail_create_acl.store(true, Ordering::SeqCst);
        admin.fail_delete_credential.store(true, Ordering::SeqCst);
        let registrar = make_registrar(store.clone(), admin.clone());

        let err = registrar.register(&make_spec()).await.unwrap_err();

        match err {
            RegistrationError::StepUnrecovered { step, rollback, .. } => {
                assert_eq!(step, RegistrationStep::AclPolicy);
                assert_eq!(rollback.orphaned.len(), 1);
                assert_eq!(
                    rollback.orphaned[0].resource,
                    RegistrationStep::BrokerCredential
                );
            }
            other => panic!("expected StepUnrecovered, got {:?}", other),
        }

        // The record compensation still ran despite the credential failure.
        assert_eq!(store.device_count(), 0);
    }

    #[tokio::test]
    async fn test_rollback_removes_everything() {
        let store = Arc::new(MemoryStore::new());
        let admin = Arc::new(RecordingAdmin::new());
        let registrar = make_registrar(store.clone(), admin.clone());

        let credentials = registrar.register(&make_spec()).await.unwrap();
        registrar.rollback(&credentials.client_id).await.unwrap();

        assert_eq!(store.device_count(), 0);
        assert!(admin.credentials.lock().unwrap().is_empty());
        assert!(admin.acls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_reports_partial_failure() {
        let store = Arc::new(MemoryStore::new());
        let admin = Arc::new(RecordingAdmin::new());
        let registrar = make_registrar(store.clone(), admin.clone());

        let credentials = registrar.register(&make_spec()).await.unwrap();
        admin.fail_delete_acl.store(true, Ordering::SeqCst);

        let err = registrar.rollback(&credentials.client_id).await.unwrap_err();

        assert_eq!(err.client_id, credentials.client_id);
        assert_eq!(err.orphaned.len(), 1);
        assert_eq!(err.orphaned[0].resource, RegistrationStep::AclPolicy);
        // Later compensations were still attempted.
        assert!(admin.credentials.lock().unwrap().is_empty());
        assert_eq!(store.device_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_password_length() {
        let store = Arc::new(MemoryStore::new());
        let admin = Arc::new(RecordingAdmin::new());
        let registrar = make_registrar(store, admin).with_password_len(32);

        let credentials = registrar.register(&make_spec()).await.unwrap();
        assert_eq!(credentials.password.len(), 32);
    }
}
