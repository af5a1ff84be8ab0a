//! GATT discovery pipeline
//! After a transport connect, walks service discovery → characteristic
//! discovery → notification subscription → initial read for exactly the
//! roll-result characteristic. Steps are strictly sequential; disconnect
//! resets to idle and a reconnect starts the walk from the beginning.

use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use uuid::Uuid;

use crate::core::bluetooth::constants::UUID_ROLL_RESULT_CHAR;
use crate::core::bluetooth::link::BleCentral;
use crate::core::bluetooth::types::{CharacteristicSession, PeripheralId};

/// A missing service or characteristic means the accessory does not expose
/// the expected profile. That is a compatibility failure, not a transient
/// one, so the pipeline aborts rather than retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("expected service {0} not present on the peripheral")]
    ServiceMissing(Uuid),
    #[error("roll characteristic {0} not present in the profile service")]
    CharacteristicMissing(Uuid),
    #[error("discovery failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiscoveryPhase {
    #[default]
    Idle,
    DiscoveringServices,
    DiscoveringCharacteristics,
    Subscribing,
    Active,
}

/// Drives discovery and subscription for one connection cycle.
pub struct GattDiscoveryPipeline {
    central: Arc<dyn BleCentral>,
    phase: DiscoveryPhase,
    peripheral: Option<PeripheralId>,
    session: Option<CharacteristicSession>,
}

impl GattDiscoveryPipeline {
    pub fn new(central: Arc<dyn BleCentral>) -> Self {
        Self {
            central,
            phase: DiscoveryPhase::Idle,
            peripheral: None,
            session: None,
        }
    }

    pub fn phase(&self) -> DiscoveryPhase {
        self.phase
    }

    /// Whether notifications have been enabled this cycle.
    pub fn subscribed(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.subscribed)
    }

    /// Begins a fresh discovery cycle against a newly-connected peripheral,
    /// restricted to the profile's service.
    pub async fn start(&mut self, peripheral: PeripheralId, service: Uuid) {
        if self.phase != DiscoveryPhase::Idle {
            warn!("Discovery restarted while in {:?}", self.phase);
            self.reset();
        }
        self.session = Some(CharacteristicSession {
            service_uuid: service,
            characteristic_uuid: UUID_ROLL_RESULT_CHAR,
            subscribed: false,
        });
        self.phase = DiscoveryPhase::DiscoveringServices;
        self.central.discover_services(&peripheral, service).await;
        self.peripheral = Some(peripheral);
    }

    /// Handles a service-discovery completion. On success, issues
    /// characteristic discovery for every matching service.
    pub async fn on_services(
        &mut self,
        result: Result<Vec<Uuid>, String>,
    ) -> Result<(), DiscoveryError> {
        if self.phase != DiscoveryPhase::DiscoveringServices {
            debug!("Ignoring service-discovery completion in {:?}", self.phase);
            return Ok(());
        }
        let expected = self.session.as_ref().map(|s| s.service_uuid).unwrap_or_default();
        let services = match result {
            Ok(services) => services,
            Err(reason) => {
                self.reset();
                return Err(DiscoveryError::Failed(reason));
            }
        };
        if services.is_empty() {
            self.reset();
            return Err(DiscoveryError::ServiceMissing(expected));
        }
        let Some(peripheral) = self.peripheral.clone() else {
            self.reset();
            return Err(DiscoveryError::Failed("peripheral handle lost".to_owned()));
        };
        self.phase = DiscoveryPhase::DiscoveringCharacteristics;
        for service in services {
            self.central
                .discover_characteristics(&peripheral, service, UUID_ROLL_RESULT_CHAR)
                .await;
        }
        Ok(())
    }

    /// Handles a characteristic-discovery completion. On success, enables
    /// notifications and issues an explicit read for an immediate value.
    pub async fn on_characteristics(
        &mut self,
        result: Result<Vec<Uuid>, String>,
    ) -> Result<(), DiscoveryError> {
        if self.phase != DiscoveryPhase::DiscoveringCharacteristics {
            debug!("Ignoring characteristic-discovery completion in {:?}", self.phase);
            return Ok(());
        }
        let characteristics = match result {
            Ok(characteristics) => characteristics,
            Err(reason) => {
                self.reset();
                return Err(DiscoveryError::Failed(reason));
            }
        };
        if !characteristics.contains(&UUID_ROLL_RESULT_CHAR) {
            self.reset();
            return Err(DiscoveryError::CharacteristicMissing(UUID_ROLL_RESULT_CHAR));
        }
        let Some(peripheral) = self.peripheral.clone() else {
            self.reset();
            return Err(DiscoveryError::Failed("peripheral handle lost".to_owned()));
        };
        self.central
            .set_notify(&peripheral, UUID_ROLL_RESULT_CHAR, true)
            .await;
        self.central.read_value(&peripheral, UUID_ROLL_RESULT_CHAR).await;
        self.phase = DiscoveryPhase::Subscribing;
        info!("Roll characteristic found, subscription requested");
        Ok(())
    }

    /// Records the notify-state change reported by the platform.
    pub fn on_notify_state(&mut self, characteristic: Uuid, enabled: bool) {
        if characteristic != UUID_ROLL_RESULT_CHAR {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.subscribed = enabled;
        }
    }

    /// Handles a value update. A failed read or notify is dropped without a
    /// phase change; a successful one activates the pipeline and yields the
    /// raw payload for decoding.
    pub fn on_value(
        &mut self,
        characteristic: Uuid,
        result: Result<Vec<u8>, String>,
    ) -> Option<Vec<u8>> {
        if characteristic != UUID_ROLL_RESULT_CHAR {
            return None;
        }
        if !matches!(self.phase, DiscoveryPhase::Subscribing | DiscoveryPhase::Active) {
            debug!("Ignoring value update in {:?}", self.phase);
            return None;
        }
        match result {
            Ok(bytes) => {
                self.phase = DiscoveryPhase::Active;
                Some(bytes)
            }
            Err(reason) => {
                debug!("Dropping failed value update: {}", reason);
                None
            }
        }
    }

    /// Discards the discovered path. Called on every disconnect; the next
    /// connect must rediscover from scratch.
    pub fn reset(&mut self) {
        self.phase = DiscoveryPhase::Idle;
        self.peripheral = None;
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::link::{BleEvent, ConnectionError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        DiscoverServices(Uuid),
        DiscoverCharacteristics(Uuid, Uuid),
        SetNotify(Uuid, bool),
        Read(Uuid),
    }

    #[derive(Default)]
    struct RecordingCentral {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingCentral {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BleCentral for RecordingCentral {
        async fn activate(&self, _events: mpsc::UnboundedSender<BleEvent>) {}

        async fn retrieve_known_peripheral(&self, identity: &PeripheralId) -> Option<PeripheralId> {
            Some(identity.clone())
        }

        async fn connect(&self, _peripheral: &PeripheralId) -> Result<(), ConnectionError> {
            Ok(())
        }

        async fn cancel_connection(&self, _peripheral: &PeripheralId) -> Result<(), ConnectionError> {
            Ok(())
        }

        async fn discover_services(&self, _peripheral: &PeripheralId, service: Uuid) {
            self.calls.lock().unwrap().push(Call::DiscoverServices(service));
        }

        async fn discover_characteristics(
            &self,
            _peripheral: &PeripheralId,
            service: Uuid,
            characteristic: Uuid,
        ) {
            self.calls
                .lock()
                .unwrap()
                .push(Call::DiscoverCharacteristics(service, characteristic));
        }

        async fn set_notify(&self, _peripheral: &PeripheralId, characteristic: Uuid, enabled: bool) {
            self.calls.lock().unwrap().push(Call::SetNotify(characteristic, enabled));
        }

        async fn read_value(&self, _peripheral: &PeripheralId, characteristic: Uuid) {
            self.calls.lock().unwrap().push(Call::Read(characteristic));
        }
    }

    fn service() -> Uuid {
        crate::core::dice::DiceColor::Pink.service_uuid()
    }

    fn pipeline() -> (GattDiscoveryPipeline, Arc<RecordingCentral>) {
        let central = Arc::new(RecordingCentral::default());
        (GattDiscoveryPipeline::new(central.clone()), central)
    }

    async fn run_to_subscribing(pipeline: &mut GattDiscoveryPipeline) {
        pipeline.start(PeripheralId::new("dice-1"), service()).await;
        pipeline.on_services(Ok(vec![service()])).await.unwrap();
        pipeline
            .on_characteristics(Ok(vec![UUID_ROLL_RESULT_CHAR]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn walks_the_full_pipeline_in_order() {
        let (mut pipeline, central) = pipeline();
        run_to_subscribing(&mut pipeline).await;
        assert_eq!(pipeline.phase(), DiscoveryPhase::Subscribing);

        assert_eq!(
            central.calls(),
            vec![
                Call::DiscoverServices(service()),
                Call::DiscoverCharacteristics(service(), UUID_ROLL_RESULT_CHAR),
                Call::SetNotify(UUID_ROLL_RESULT_CHAR, true),
                Call::Read(UUID_ROLL_RESULT_CHAR),
            ]
        );

        let bytes = pipeline
            .on_value(UUID_ROLL_RESULT_CHAR, Ok(b"three".to_vec()))
            .unwrap();
        assert_eq!(bytes, b"three");
        assert_eq!(pipeline.phase(), DiscoveryPhase::Active);
    }

    #[tokio::test]
    async fn no_characteristic_discovery_before_services_succeed() {
        let (mut pipeline, central) = pipeline();
        pipeline.start(PeripheralId::new("dice-1"), service()).await;

        // Completion for characteristics cannot arrive first; feeding one
        // anyway must not advance the pipeline.
        pipeline
            .on_characteristics(Ok(vec![UUID_ROLL_RESULT_CHAR]))
            .await
            .unwrap();
        assert_eq!(pipeline.phase(), DiscoveryPhase::DiscoveringServices);
        assert!(
            !central
                .calls()
                .iter()
                .any(|c| matches!(c, Call::SetNotify(..)))
        );
    }

    #[tokio::test]
    async fn empty_service_list_aborts_to_idle() {
        let (mut pipeline, central) = pipeline();
        pipeline.start(PeripheralId::new("dice-1"), service()).await;

        let err = pipeline.on_services(Ok(vec![])).await.unwrap_err();
        assert_eq!(err, DiscoveryError::ServiceMissing(service()));
        assert_eq!(pipeline.phase(), DiscoveryPhase::Idle);
        assert!(
            !central
                .calls()
                .iter()
                .any(|c| matches!(c, Call::DiscoverCharacteristics(..)))
        );
    }

    #[tokio::test]
    async fn missing_characteristic_aborts_to_idle() {
        let (mut pipeline, _central) = pipeline();
        pipeline.start(PeripheralId::new("dice-1"), service()).await;
        pipeline.on_services(Ok(vec![service()])).await.unwrap();

        let other = Uuid::from_u128(0xdead);
        let err = pipeline.on_characteristics(Ok(vec![other])).await.unwrap_err();
        assert_eq!(err, DiscoveryError::CharacteristicMissing(UUID_ROLL_RESULT_CHAR));
        assert_eq!(pipeline.phase(), DiscoveryPhase::Idle);
    }

    #[tokio::test]
    async fn platform_error_aborts_to_idle() {
        let (mut pipeline, _central) = pipeline();
        pipeline.start(PeripheralId::new("dice-1"), service()).await;
        let err = pipeline.on_services(Err("gatt error".into())).await.unwrap_err();
        assert_eq!(err, DiscoveryError::Failed("gatt error".into()));
        assert_eq!(pipeline.phase(), DiscoveryPhase::Idle);
    }

    #[tokio::test]
    async fn reconnect_rediscovers_from_the_beginning() {
        let (mut pipeline, central) = pipeline();
        run_to_subscribing(&mut pipeline).await;

        // Disconnect mid-cycle.
        pipeline.reset();
        assert_eq!(pipeline.phase(), DiscoveryPhase::Idle);
        assert!(!pipeline.subscribed());

        // A new cycle starts with service discovery again, not with any
        // cached characteristic.
        pipeline.start(PeripheralId::new("dice-1"), service()).await;
        assert_eq!(pipeline.phase(), DiscoveryPhase::DiscoveringServices);
        let services_discoveries = central
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::DiscoverServices(_)))
            .count();
        assert_eq!(services_discoveries, 2);
    }

    #[tokio::test]
    async fn failed_value_update_is_dropped_without_a_transition() {
        let (mut pipeline, _central) = pipeline();
        run_to_subscribing(&mut pipeline).await;

        let out = pipeline.on_value(UUID_ROLL_RESULT_CHAR, Err("read failed".into()));
        assert!(out.is_none());
        assert_eq!(pipeline.phase(), DiscoveryPhase::Subscribing);
    }

    #[tokio::test]
    async fn value_updates_for_other_characteristics_are_ignored() {
        let (mut pipeline, _central) = pipeline();
        run_to_subscribing(&mut pipeline).await;

        let out = pipeline.on_value(Uuid::from_u128(0xbeef), Ok(b"three".to_vec()));
        assert!(out.is_none());
        assert_eq!(pipeline.phase(), DiscoveryPhase::Subscribing);
    }

    #[tokio::test]
    async fn notify_state_marks_the_session_subscribed() {
        let (mut pipeline, _central) = pipeline();
        run_to_subscribing(&mut pipeline).await;
        assert!(!pipeline.subscribed());
        pipeline.on_notify_state(UUID_ROLL_RESULT_CHAR, true);
        assert!(pipeline.subscribed());
    }
}
