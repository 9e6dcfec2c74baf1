//! Edit, branch and redo state machine
//!
//! Elm-style: a pure transition from (state, session, event) to a new state
//! plus effects that the controller applies to the store.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::EditState;
pub use transition::{transition, TransitionError};
