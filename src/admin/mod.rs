//! Admin console logic: listing, drafts, the login gate and tab navigation.

pub mod console;
pub mod draft;
pub mod listing;
pub mod navigation;
pub mod session;

pub use console::{AdminConsole, Dashboard};
pub use draft::{BlogDraft, DraftMode};
pub use navigation::{Tab, View};
pub use session::SessionGate;
