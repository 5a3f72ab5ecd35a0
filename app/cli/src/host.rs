//! Navigation host for the terminal front end.

use manga_reader_core::{NavigationHost, ReaderAddress};
use tokio::sync::mpsc;

/// Chapter changes are queued for the main loop, which reopens the session at the new
/// address. In-place address updates are only logged; a terminal has no location bar.
#[derive(Debug, Clone)]
pub struct TerminalHost {
    navigations: mpsc::UnboundedSender<ReaderAddress>,
}

impl TerminalHost {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReaderAddress>) {
        let (navigations, receiver) = mpsc::unbounded_channel();
        (Self { navigations }, receiver)
    }
}

impl NavigationHost for TerminalHost {
    fn navigate_to(&self, address: &ReaderAddress) {
        if self.navigations.send(address.clone()).is_err() {
            tracing::warn!(target: "host", %address, "reader loop has stopped, dropping navigation");
        }
    }

    fn replace_address(&self, address: &ReaderAddress) {
        tracing::debug!(target: "host", %address, "address");
    }
}
