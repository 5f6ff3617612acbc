use tracing::debug;

use crate::models::{Domain, Identifier};
use crate::services::selection_store::SelectionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    List,
    Detail(Identifier),
}

/// Which view a domain shows right now. No I/O beyond reading the store.
pub fn route(store: &SelectionStore, domain: Domain) -> ViewMode {
    match store.get(domain) {
        Some(id) => ViewMode::Detail(id),
        None => ViewMode::List,
    }
}

/// Token tying a response to the navigation that asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// A resolved view identity that needs fresh data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub generation: Generation,
    pub mode: ViewMode,
}

/// Turns "the routed view changed" into load triggers.
///
/// Generations only ever grow, so anything tagged with an older one belongs
/// to a view the user already left.
#[derive(Debug)]
pub struct RouteTracker {
    domain: Domain,
    current: Option<ViewMode>,
    generation: Generation,
}

impl RouteTracker {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            current: None,
            generation: Generation::default(),
        }
    }

    pub fn current_mode(&self) -> Option<&ViewMode> {
        self.current.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Returns an activation on the first observation and whenever `mode`
    /// differs from the previous one.
    pub fn observe(&mut self, mode: ViewMode) -> Option<Activation> {
        if self.current.as_ref() == Some(&mode) {
            return None;
        }
        debug!("{} view {:?} -> {:?}", self.domain, self.current, mode);
        self.current = Some(mode.clone());
        Some(self.activate(mode))
    }

    /// New generation for the view already shown (refresh button, polling).
    pub fn reload(&mut self) -> Option<Activation> {
        let mode = self.current.clone()?;
        Some(self.activate(mode))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    fn activate(&mut self, mode: ViewMode) -> Activation {
        self.generation = self.generation.next();
        Activation {
            generation: self.generation,
            mode,
        }
    }
}
