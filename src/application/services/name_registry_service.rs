//! Name Registry Service - persisted, story-wide name reservations
//!
//! Wraps the `NameRegistry` state in a mutex and writes the whole registry
//! document back before any reservation returns. A failed write leaves the
//! in-memory state unchanged.

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::application::ports::outbound::Scope;
use crate::application::services::persistence_gateway::{collections, PersistenceGateway};
use crate::domain::entities::NameRegistry;
use crate::domain::errors::StoryResult;
use crate::domain::value_objects::{CharacterId, NameKind};

const REGISTRY_DOCUMENT: &str = "registry";

pub struct NameRegistryService {
    gateway: PersistenceGateway,
    state: Mutex<NameRegistry>,
}

impl NameRegistryService {
    /// Load the story's registry, starting empty if none was persisted
    #[instrument(skip(gateway), fields(story = %gateway.story()))]
    pub async fn load(gateway: PersistenceGateway) -> StoryResult<Self> {
        let registry = gateway
            .fetch::<NameRegistry>(collections::NAME_REGISTRY, Scope::Global, REGISTRY_DOCUMENT)
            .await?
            .unwrap_or_else(|| NameRegistry::new(gateway.story().clone()));
        info!(
            first = registry.issued_count(NameKind::First),
            middle = registry.issued_count(NameKind::Middle),
            last = registry.issued_count(NameKind::Last),
            "Loaded name registry"
        );
        Ok(Self {
            gateway,
            state: Mutex::new(registry),
        })
    }

    #[instrument(skip(self), fields(kind = %kind, owner = %owner))]
    pub async fn reserve(
        &self,
        kind: NameKind,
        owner: &CharacterId,
        slot: u32,
    ) -> StoryResult<String> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let value = next.reserve(kind, owner, slot)?;
        if next != *state {
            self.persist(&next).await?;
            *state = next;
            debug!(value = %value, "Reserved name component");
        }
        Ok(value)
    }

    /// Record a component chosen outside the registry; false if another character owns it
    #[instrument(skip(self), fields(kind = %kind, owner = %owner))]
    pub async fn claim(
        &self,
        kind: NameKind,
        value: &str,
        owner: &CharacterId,
        slot: u32,
    ) -> StoryResult<bool> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let owned = next.claim(kind, value, owner, slot);
        if next != *state {
            self.persist(&next).await?;
            *state = next;
        }
        Ok(owned)
    }

    #[instrument(skip(self, middle), fields(owner = %owner))]
    pub async fn claim_full_name(
        &self,
        first: &str,
        middle: &[String],
        last: &str,
        owner: &CharacterId,
    ) -> StoryResult<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.claim_full_name(first, middle, last, owner)?;
        if next != *state {
            self.persist(&next).await?;
            *state = next;
        }
        Ok(())
    }

    pub async fn snapshot(&self) -> NameRegistry {
        self.state.lock().await.clone()
    }

    async fn persist(&self, registry: &NameRegistry) -> StoryResult<()> {
        self.gateway
            .upsert(
                collections::NAME_REGISTRY,
                Scope::Global,
                REGISTRY_DOCUMENT,
                registry,
            )
            .await
    }
}
