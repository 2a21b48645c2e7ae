//! Transport boundary for the ordering engine.
//!
//! Only the trait lives here. Concrete HTTP clients and in-memory doubles
//! are provided by other crates.

use crate::{Category, MoveCommand, RawRule, TransportError};

/// Remote appliance holding the authoritative rule order.
///
/// Implementations must be object-safe so callers can hold a
/// `Box<dyn Appliance>`, and `Send + Sync` so one configured client can be
/// shared. Each call is exactly one request/response round trip; retries and
/// caching are not allowed.
pub trait Appliance: Send + Sync {
    /// Human-readable name of the implementation (e.g. `"routeros"`).
    fn name(&self) -> &'static str;

    /// Every rule of `category`, in the appliance's current order.
    fn list_rules(&self, category: Category) -> Result<Vec<RawRule>, TransportError>;

    /// Reposition the rules named in `cmd` within `category`.
    fn move_rules(&self, category: Category, cmd: &MoveCommand) -> Result<(), TransportError>;
}

impl<T: Appliance + ?Sized> Appliance for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn list_rules(&self, category: Category) -> Result<Vec<RawRule>, TransportError> {
        (**self).list_rules(category)
    }

    fn move_rules(&self, category: Category, cmd: &MoveCommand) -> Result<(), TransportError> {
        (**self).move_rules(category, cmd)
    }
}
