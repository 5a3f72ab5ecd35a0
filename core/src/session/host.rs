//! Host environment hooks.

use crate::types::ReaderAddress;

/// Receives address changes from the session.
///
/// `navigate_to` is used for chapter changes: the host is expected to open a fresh session
/// at the new address. `replace_address` updates the visible address in place without
/// creating a history entry. Both run after the session state has been updated and must not
/// call back into the session synchronously while expecting the old position.
pub trait NavigationHost: Send + Sync {
    fn navigate_to(&self, address: &ReaderAddress);

    fn replace_address(&self, address: &ReaderAddress);
}
