use std::collections::HashMap;

use thiserror::Error;

use super::{EventKind, Source};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{source_name}/{kind} registered twice")]
    DuplicateRoute { source_name: Source, kind: EventKind },

    #[error("no route registered for {0}")]
    Unrouted(EventKind),
}

/// Routes `(source, kind)` strings to a closed [`EventKind`].
#[derive(Debug, Clone)]
pub struct Registry {
    routes: HashMap<Source, HashMap<&'static str, EventKind>>,
}

impl Registry {
    /// Build from `kinds`, rejecting duplicate routes.
    pub fn new(kinds: &[EventKind]) -> Result<Self, RegistryError> {
        let mut routes: HashMap<Source, HashMap<&'static str, EventKind>> = HashMap::new();
        for &kind in kinds {
            let by_kind = routes.entry(kind.source()).or_default();
            if by_kind.insert(kind.as_str(), kind).is_some() {
                return Err(RegistryError::DuplicateRoute {
                    source_name: kind.source(),
                    kind,
                });
            }
        }
        Ok(Self { routes })
    }

    /// The full registry; every handled kind must be routable.
    pub fn standard() -> Result<Self, RegistryError> {
        let registry = Self::new(&EventKind::ALL)?;
        registry.ensure_complete()?;
        Ok(registry)
    }

    pub fn ensure_complete(&self) -> Result<(), RegistryError> {
        match EventKind::ALL
            .into_iter()
            .find(|&kind| self.route(kind.source(), kind.as_str()).is_none())
        {
            Some(kind) => Err(RegistryError::Unrouted(kind)),
            None => Ok(()),
        }
    }

    /// Resolve raw envelope strings. `None` means nothing handles this pair.
    pub fn resolve(&self, source: &str, kind: &str) -> Option<EventKind> {
        self.route(Source::parse(source)?, kind)
    }

    fn route(&self, source: Source, kind: &str) -> Option<EventKind> {
        self.routes.get(&source)?.get(kind).copied()
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
