//! Brand Service - persisted brand substitutions for one story
//!
//! Same write discipline as the name registry: mutate a copy, persist the
//! whole document, then swap it in.

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::application::ports::outbound::Scope;
use crate::application::services::persistence_gateway::{collections, PersistenceGateway};
use crate::domain::entities::{Brand, BrandRegistry};
use crate::domain::errors::StoryResult;

const BRANDS_DOCUMENT: &str = "brands";

pub struct BrandService {
    gateway: PersistenceGateway,
    state: Mutex<BrandRegistry>,
}

impl BrandService {
    #[instrument(skip(gateway), fields(story = %gateway.story()))]
    pub async fn load(gateway: PersistenceGateway) -> StoryResult<Self> {
        let registry = gateway
            .fetch::<BrandRegistry>(collections::BRANDS, Scope::Global, BRANDS_DOCUMENT)
            .await?
            .unwrap_or_else(|| BrandRegistry::new(gateway.story().clone()));
        debug!(brands = registry.brands().len(), "Loaded brand registry");
        Ok(Self {
            gateway,
            state: Mutex::new(registry),
        })
    }

    /// Story name for a real brand, drawn and persisted on first use
    #[instrument(skip(self))]
    pub async fn substitute(&self, real_name: &str) -> StoryResult<Brand> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let brand = next.substitute(real_name)?;
        if next != *state {
            self.persist(&next).await?;
            *state = next;
            info!(story_name = %brand.story_name, "Substituted brand");
        }
        Ok(brand)
    }

    #[instrument(skip(self))]
    pub async fn assign(&self, real_name: &str, story_name: &str) -> StoryResult<Brand> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let brand = next.assign(real_name, story_name)?;
        if next != *state {
            self.persist(&next).await?;
            *state = next;
        }
        Ok(brand)
    }

    pub async fn brands(&self) -> Vec<Brand> {
        self.state.lock().await.brands()
    }

    async fn persist(&self, registry: &BrandRegistry) -> StoryResult<()> {
        self.gateway
            .upsert(collections::BRANDS, Scope::Global, BRANDS_DOCUMENT, registry)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::StoryId;
    use crate::infrastructure::persistence::InMemoryDocumentStore;
    use std::sync::Arc;

    fn gateway(store: &InMemoryDocumentStore) -> PersistenceGateway {
        PersistenceGateway::new(Arc::new(store.clone()), StoryId::parse("harbor").unwrap())
    }

    #[tokio::test]
    async fn test_substitutions_survive_reload() {
        let store = InMemoryDocumentStore::new();
        let first_session = BrandService::load(gateway(&store)).await.unwrap();
        let acme = first_session.substitute("Acme Shipping").await.unwrap();
        let pinned = first_session
            .assign("Globex", "Gullwing Freight")
            .await
            .unwrap();

        let second_session = BrandService::load(gateway(&store)).await.unwrap();
        assert_eq!(second_session.substitute("Acme Shipping").await.unwrap(), acme);
        assert_eq!(second_session.brands().await, vec![acme, pinned]);
    }

    #[tokio::test]
    async fn test_rejected_assignment_persists_nothing() {
        let store = InMemoryDocumentStore::new();
        let service = BrandService::load(gateway(&store)).await.unwrap();
        assert!(service.assign("Globex", "x").await.is_err());
        assert!(service.brands().await.is_empty());
        assert!(store.is_empty().await);
    }
}
