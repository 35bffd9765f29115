//! TCP onboarding listener.
//!
//! The handshake is two-phase: the accept loop validates an inbound
//! specification and emits a `PendingOnboarding` offer; whoever holds the
//! offer decides whether and when to commit it. Committing provisions the
//! device through the registration saga, pushes the credential payload to
//! the device's declared response endpoint, and waits for its confirmation.
//! The first confirmed device closes the provisioning window.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{HubError, OnboardingError, ValidationError};
use crate::protocol::{ConfirmationMessage, CredentialPayload, ErrorReply};
use crate::registration::Registrar;
use crate::types::DeviceSpecification;

/// Default TCP onboarding port
pub const ONBOARDING_PORT: u16 = 12222;

/// Accept timeout - bounds how long a stop request goes unnoticed
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the device to acknowledge its credentials.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on an inbound specification.
const MAX_REQUEST_BYTES: usize = 4096;

/// TCP listener that turns valid device specifications into onboarding
/// offers.
pub struct OnboardingListener {
    listener: TcpListener,
}

impl OnboardingListener {
    /// Bind to the given TCP port on all interfaces.
    pub async fn bind(port: u16) -> Result<Self, HubError> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!("onboarding listener on port {}", port);

        Ok(Self { listener })
    }

    /// Port the listener is bound to.
    pub fn local_port(&self) -> std::io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Accept loop.
    ///
    /// Each valid specification is sent to `offers`. Malformed input gets a
    /// structured error reply on its own connection and the loop keeps
    /// serving. The loop ends when `session` is cancelled - externally, or
    /// by the first committed onboarding - or when the offer receiver goes
    /// away. The token is re-checked after every accept timeout.
    pub async fn run(
        &self,
        session: CancellationToken,
        offers: mpsc::Sender<PendingOnboarding>,
    ) -> Result<(), HubError> {
        loop {
            if session.is_cancelled() {
                info!("onboarding listener stopped");
                return Ok(());
            }

            let (stream, addr) = match timeout(ACCEPT_TIMEOUT, self.listener.accept()).await {
                Ok(Ok(conn)) => conn,
                Ok(Err(e)) => {
                    warn!("accept error: {}", e);
                    continue;
                }
                Err(_) => continue, // re-check the stop token
            };

            info!("device connected from {}", addr);

            match handle_client(stream).await {
                Ok(Some(spec)) => {
                    info!("offering device `{}` for registration", spec.name);
                    let pending = PendingOnboarding {
                        spec,
                        session: session.clone(),
                    };
                    if offers.send(pending).await.is_err() {
                        // Nobody is listening for offers anymore.
                        return Ok(());
                    }
                }
                Ok(None) => {} // malformed input was answered on that connection
                Err(e) => warn!("client handling failed: {}", e),
            }
        }
    }
}

/// Read and validate one specification.
///
/// Malformed input gets an error reply on this connection only; the
/// listener itself is not torn down.
async fn handle_client(mut stream: TcpStream) -> Result<Option<DeviceSpecification>, HubError> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let len = stream.read(&mut buf).await?;

    match parse_specification(&buf[..len]) {
        Ok(spec) => {
            // The inbound connection is done; credentials travel on a fresh
            // connection to the device's declared response endpoint.
            Ok(Some(spec))
        }
        Err(e) => {
            warn!("rejected specification: {}", e);
            respond_error(&mut stream, "invalid-specification", &e.to_string()).await?;
            Ok(None)
        }
    }
}

fn parse_specification(raw: &[u8]) -> Result<DeviceSpecification, ValidationError> {
    let spec: DeviceSpecification =
        serde_json::from_slice(raw).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    spec.validate()?;
    Ok(spec)
}

async fn respond_error(stream: &mut TcpStream, kind: &str, detail: &str) -> Result<(), HubError> {
    let reply = ErrorReply::failure(kind, detail);
    let payload = serde_json::to_vec(&reply).map_err(|e| HubError::Other(e.to_string()))?;
    stream.write_all(&payload).await?;
    Ok(())
}

/// A validated specification waiting for the caller's go-ahead.
pub struct PendingOnboarding {
    spec: DeviceSpecification,
    session: CancellationToken,
}

impl PendingOnboarding {
    pub fn device_name(&self) -> &str {
        &self.spec.name
    }

    pub fn specification(&self) -> &DeviceSpecification {
        &self.spec
    }

    /// Provision the device and push its credentials.
    ///
    /// Opens an outbound connection to the device's response endpoint, runs
    /// the registration saga, sends the credential payload, and waits for
    /// the device's `{status}` confirmation. A positive confirmation closes
    /// the provisioning window; anything else - decline, malformed payload,
    /// timeout, lost connection - rolls the registration back before the
    /// cause is reported.
    pub async fn commit(
        self,
        registrar: &Registrar,
    ) -> Result<CredentialPayload, OnboardingError> {
        let endpoint = self.spec.response_endpoint.to_string();
        let mut stream =
            TcpStream::connect(&endpoint)
                .await
                .map_err(|e| OnboardingError::Endpoint {
                    endpoint: endpoint.clone(),
                    cause: e.to_string(),
                })?;

        let credentials = match registrar.register(&self.spec).await {
            Ok(credentials) => credentials,
            Err(e) => {
                // Best effort: tell the device registration fell through.
                let reply = ErrorReply::failure("registration-error", "internal error");
                if let Ok(payload) = serde_json::to_vec(&reply) {
                    let _ = stream.write_all(&payload).await;
                }
                return Err(e.into());
            }
        };

        let payload = serde_json::to_vec(&credentials)
            .map_err(|e| OnboardingError::Internal(e.to_string()))?;

        if let Err(e) = stream.write_all(&payload).await {
            let cause = OnboardingError::ConnectionLost(e.to_string());
            return Err(self.rolled_back(registrar, &credentials.client_id, cause).await);
        }

        match await_confirmation(&mut stream).await {
            Ok(()) => {
                info!(
                    "device `{}` confirmed onboarding as {}",
                    self.spec.name, credentials.client_id
                );
                // First confirmed device closes the provisioning window.
                self.session.cancel();
                Ok(credentials)
            }
            Err(cause) => Err(self.rolled_back(registrar, &credentials.client_id, cause).await),
        }
    }

    /// Run compensations and attach any orphan report to the causal error.
    async fn rolled_back(
        &self,
        registrar: &Registrar,
        client_id: &str,
        cause: OnboardingError,
    ) -> OnboardingError {
        warn!(
            "onboarding of `{}` failed ({}); rolling back {}",
            self.spec.name, cause, client_id
        );

        match registrar.rollback(client_id).await {
            Ok(()) => cause,
            Err(rollback) => OnboardingError::Unrecovered {
                cause: Box::new(cause),
                rollback,
            },
        }
    }
}

async fn await_confirmation(stream: &mut TcpStream) -> Result<(), OnboardingError> {
    let mut buf = vec![0u8; 1024];

    let len = match timeout(CONFIRM_TIMEOUT, stream.read(&mut buf)).await {
        Ok(Ok(0)) => {
            return Err(OnboardingError::ConnectionLost(
                "device closed the connection".to_string(),
            ))
        }
        Ok(Ok(len)) => len,
        Ok(Err(e)) => return Err(OnboardingError::ConnectionLost(e.to_string())),
        Err(_) => return Err(OnboardingError::ConfirmationTimeout(CONFIRM_TIMEOUT.as_secs())),
    };

    let confirm: ConfirmationMessage = serde_json::from_slice(&buf[..len])
        .map_err(|e| OnboardingError::MalformedConfirmation(e.to_string()))?;

    if confirm.status {
        Ok(())
    } else {
        Err(OnboardingError::Declined)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::broker::admin::testing::RecordingAdmin;
    use crate::store::testing::MemoryStore;
    use crate::types::{DeviceType, FieldSpec, FieldType, ResponseEndpoint};

    use super::*;

    const TEST_TIMEOUT: Duration = Duration::from_secs(10);

    struct Harness {
        listener_port: u16,
        offers: mpsc::Receiver<PendingOnboarding>,
        session: CancellationToken,
        registrar: Registrar,
        store: Arc<MemoryStore>,
        admin: Arc<RecordingAdmin>,
    }

    async fn start_harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let admin = Arc::new(RecordingAdmin::new());
        let registrar = Registrar::new(store.clone(), admin.clone(), "192.168.1.10", 1883);

        let listener = OnboardingListener::bind(0).await.unwrap();
        let listener_port = listener.local_port().unwrap();

        let session = CancellationToken::new();
        let token = session.clone();
        let (tx, offers) = mpsc::channel(4);
        tokio::spawn(async move { listener.run(token, tx).await });

        Harness {
            listener_port,
            offers,
            session,
            registrar,
            store,
            admin,
        }
    }

    fn spec_json(response_port: u16) -> String {
        format!(
            r#"{{
                "name": "thermostat",
                "type": "sensor",
                "fields": [{{"name": "temperature", "type": "float", "min": 0, "max": 100}}],
                "responseEndpoint": {{"address": "127.0.0.1", "port": {}}}
            }}"#,
            response_port
        )
    }

    async fn send_spec(port: u16, payload: &str) {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream.write_all(payload.as_bytes()).await.unwrap();
    }

    /// Fake device side: waits for the hub to dial in with credentials,
    /// answers with the given confirmation, and hands back the payload.
    async fn run_device(
        endpoint: TcpListener,
        confirmation: &'static str,
    ) -> CredentialPayload {
        let (mut stream, _) = endpoint.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let len = stream.read(&mut buf).await.unwrap();
        let credentials: CredentialPayload = serde_json::from_slice(&buf[..len]).unwrap();
        stream.write_all(confirmation.as_bytes()).await.unwrap();
        credentials
    }

    #[tokio::test]
    async fn test_end_to_end_onboarding() {
        let mut harness = start_harness().await;

        let endpoint = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let response_port = endpoint.local_addr().unwrap().port();
        let device = tokio::spawn(run_device(endpoint, r#"{"status": true}"#));

        send_spec(harness.listener_port, &spec_json(response_port)).await;

        let pending = timeout(TEST_TIMEOUT, harness.offers.recv())
            .await
            .unwrap()
            .expect("no offer arrived");
        assert_eq!(pending.device_name(), "thermostat");

        let credentials = timeout(TEST_TIMEOUT, pending.commit(&harness.registrar))
            .await
            .unwrap()
            .unwrap();

        // Device received the same payload the commit returned.
        let seen = timeout(TEST_TIMEOUT, device).await.unwrap().unwrap();
        assert_eq!(seen, credentials);
        assert_eq!(
            credentials.topic,
            format!("/devices/{}", credentials.client_id)
        );

        // Provisioned on both collaborators, and the session is closed.
        assert_eq!(harness.store.device_count(), 1);
        assert!(harness
            .admin
            .credentials
            .lock()
            .unwrap()
            .contains(&credentials.client_id));
        assert!(harness.session.is_cancelled());
    }

    #[tokio::test]
    async fn test_malformed_input_answered_and_listener_survives() {
        let mut harness = start_harness().await;

        // Garbage gets a structured failure reply on the same connection.
        let mut stream = TcpStream::connect(("127.0.0.1", harness.listener_port))
            .await
            .unwrap();
        stream.write_all(b"not json at all").await.unwrap();

        let mut buf = vec![0u8; 1024];
        let len = timeout(TEST_TIMEOUT, stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply: Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(reply["status"], "failure");
        assert_eq!(reply["type"], "invalid-specification");

        // The next, valid device still gets an offer.
        send_spec(harness.listener_port, &spec_json(9000)).await;
        let pending = timeout(TEST_TIMEOUT, harness.offers.recv())
            .await
            .unwrap()
            .expect("listener stopped serving after bad input");
        assert_eq!(pending.device_name(), "thermostat");
    }

    #[tokio::test]
    async fn test_numeric_field_without_range_is_rejected_before_persistence() {
        let mut harness = start_harness().await;

        let payload = r#"{
            "name": "thermostat",
            "type": "sensor",
            "fields": [{"name": "temperature", "type": "float"}],
            "responseEndpoint": {"address": "127.0.0.1", "port": 9000}
        }"#;

        let mut stream = TcpStream::connect(("127.0.0.1", harness.listener_port))
            .await
            .unwrap();
        stream.write_all(payload.as_bytes()).await.unwrap();

        let mut buf = vec![0u8; 1024];
        let len = timeout(TEST_TIMEOUT, stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply: Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(reply["status"], "failure");

        // Nothing was offered, nothing persisted.
        assert!(
            timeout(Duration::from_millis(300), harness.offers.recv())
                .await
                .is_err()
        );
        assert_eq!(harness.store.device_count(), 0);
    }

    #[tokio::test]
    async fn test_declined_confirmation_rolls_back() {
        let mut harness = start_harness().await;

        let endpoint = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let response_port = endpoint.local_addr().unwrap().port();
        let device = tokio::spawn(run_device(endpoint, r#"{"status": false}"#));

        send_spec(harness.listener_port, &spec_json(response_port)).await;
        let pending = timeout(TEST_TIMEOUT, harness.offers.recv())
            .await
            .unwrap()
            .unwrap();

        let err = timeout(TEST_TIMEOUT, pending.commit(&harness.registrar))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, OnboardingError::Declined));
        timeout(TEST_TIMEOUT, device).await.unwrap().unwrap();

        // Everything the saga committed is gone again.
        assert_eq!(harness.store.device_count(), 0);
        assert!(harness.admin.credentials.lock().unwrap().is_empty());
        assert!(harness.admin.acls.lock().unwrap().is_empty());
        // A failed onboarding leaves the window open.
        assert!(!harness.session.is_cancelled());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_commits_nothing() {
        let mut harness = start_harness().await;

        // Response endpoint nobody listens on.
        let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = unused.local_addr().unwrap().port();
        drop(unused);

        send_spec(harness.listener_port, &spec_json(dead_port)).await;
        let pending = timeout(TEST_TIMEOUT, harness.offers.recv())
            .await
            .unwrap()
            .unwrap();

        let err = timeout(TEST_TIMEOUT, pending.commit(&harness.registrar))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, OnboardingError::Endpoint { .. }));
        assert_eq!(harness.store.device_count(), 0);
    }
}
