// ============================================================================
// Identity Interface
// ============================================================================

use crate::domain::PeerId;

/// Answers "who am I" for the engine and the transaction manager.
pub trait Identity: Send + Sync {
    fn own_id(&self) -> &PeerId;

    fn is_own(&self, peer: &PeerId) -> bool {
        self.own_id() == peer
    }
}

/// Fixed identity, set at startup.
#[derive(Debug, Clone)]
pub struct StaticIdentity(PeerId);

impl StaticIdentity {
    pub fn new(id: PeerId) -> Self {
        Self(id)
    }
}

impl Identity for StaticIdentity {
    fn own_id(&self) -> &PeerId {
        &self.0
    }
}
