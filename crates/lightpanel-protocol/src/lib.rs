//! Light Panel Serial Protocol
//!
//! This crate provides the types and the protocol state machine used to drive
//! the LED light panel microcontroller over its serial link. The panel speaks a
//! half-duplex, line-based ASCII protocol with no request identifiers, so the
//! host may only ever have a single command in flight.
//!
//! # Protocol Overview
//!
//! - **Commands** (host → panel): space separated tokens terminated with `\n`
//! - **Acknowledgements** (panel → host): a fixed line per command, e.g. `DONE`
//! - **Unsolicited lines** (panel → host): anything that arrives while no
//!   acknowledgement is pending
//!
//! | Operation        | Outgoing                          | Expected ack     |
//! |------------------|-----------------------------------|------------------|
//! | connect          | `HELLO`                           | `READY`          |
//! | disconnect       | `GOODBYE`                         | `SHUTDOWN`       |
//! | set tempo        | `SETTEMPO <bpm>`                  | `TEMPO <bpm>`    |
//! | set color        | `SETCOLOR <row> <col> <r> <g> <b> [a]` | `DONE`      |
//! | set on/off       | `ON`/`OFF <row> <col>`            | `DONE`           |
//! | set color+state  | `ON`/`OFF <row> <col> <r> <g> <b> [a]` | `DONE`      |
//! | reset line       | `RESET <line>`                    | `OK <line>`      |
//! | stop line        | `STOP <line> <0\|1>`              | `STOPPED <line>` |
//! | panel off        | `PANELOFF`                        | `OFF`            |
//!
//! # Example
//!
//! ```rust
//! use lightpanel_protocol::{Ingested, PanelEvent, PanelState, PanelStateMachine};
//!
//! let mut machine: PanelStateMachine = PanelStateMachine::new(Vec::new());
//! machine.connect().unwrap();
//! assert_eq!(machine.current_state(), PanelState::Connecting);
//!
//! assert_eq!(machine.ingest("READY\r"), Ingested::Response);
//! assert_eq!(machine.current_state(), PanelState::Connected);
//!
//! let events: Vec<PanelEvent> = machine.sink_mut().drain(..).collect();
//! assert_eq!(events[0], PanelEvent::Send("HELLO".to_string()));
//! ```

mod codec;
mod color;
mod commands;
mod error;
mod events;
mod machine;
mod state;
mod validate;

pub use codec::*;
pub use color::*;
pub use commands::*;
pub use error::*;
pub use events::*;
pub use machine::*;
pub use state::*;
pub use validate::*;
