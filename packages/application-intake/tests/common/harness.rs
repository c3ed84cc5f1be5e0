use application_intake::domain::{ApplicationRecord, ExternalUid};
use application_intake::kernel::test_dependencies::TestDependencies;
use application_intake::store::EntityStore;
use application_intake::{Engine, EngineError, EventEnvelope, InvocationContext, Outcome};

/// Engine over mocked collaborators and an in-memory store.
pub struct TestHarness {
    pub deps: TestDependencies,
    pub engine: Engine,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with(TestDependencies::new())
    }

    /// Build the engine after adjusting `deps` (settings, seeded data).
    pub fn with(deps: TestDependencies) -> Self {
        let engine = deps.engine();
        Self { deps, engine }
    }

    pub async fn handle(&self, envelope: &EventEnvelope) -> Result<Outcome, EngineError> {
        self.engine.handle_with_deadline(envelope).await
    }

    pub async fn handle_in(
        &self,
        ctx: &InvocationContext,
        envelope: &EventEnvelope,
    ) -> Result<Outcome, EngineError> {
        self.engine.handle(ctx, envelope).await
    }

    /// The stored record for `uid`, read through the index.
    pub async fn stored(&self, uid: &str) -> ApplicationRecord {
        let uid = ExternalUid::new(uid);
        let key = self
            .deps
            .store
            .get_by_external_uid(&uid)
            .await
            .expect("index read failed")
            .expect("uid not indexed");
        self.deps
            .store
            .get_application(&key)
            .await
            .expect("record read failed")
            .expect("record missing")
    }

    /// Forget calls and counters from setup.
    pub fn reset_observations(&self) {
        self.deps.calls.clear();
    }
}
