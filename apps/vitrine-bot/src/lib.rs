//! Transactional core of the vitrine storefront: a per-user ticket
//! lifecycle that sells SMS verification numbers, paid from a PIX-funded
//! balance. The messaging gateway and the admin panel live outside this
//! crate and talk to it through [`models::event::Event`] /
//! [`vitrine_shared::Reply`].

pub mod engine;
pub mod error;
pub mod models;
pub mod providers;
pub mod services;
pub mod state;

pub use engine::{TicketEngine, Timings};
pub use error::StoreError;
pub use state::AppState;
