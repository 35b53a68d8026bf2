//! Message passing between the dispatch side and the UI side.
//!
//! The two sides share no memory: commands and events cross as serialized
//! JSON, and delivery is best effort. A receiver that has gone away is not
//! an error.
//!
//! # Main types
//!
//! - [`Command`]: Inbound user actions (`SUMMARIZE`, `CHAT_ASK`, ...).
//! - [`MessageBridge`]: Runs commands and relays their events to an [`EventSink`].
//! - [`OutboundMessage`]: The `{PREFIX}_{KIND}` wire message.
//! - [`PanelRouter`]: Routes each message to the consumer registered for its prefix.
//! - [`PanelRequestContext`]: Per-request UI state, finalized on `DONE`.

/// Command-to-dispatch bridge and event relay.
pub mod bridge;
/// Inbound command set.
pub mod command;
/// Per-request UI state.
pub mod panel;
/// Outbound wire protocol.
pub mod protocol;
/// Prefix-keyed event router.
pub mod router;
/// Outbound delivery targets.
pub mod sink;

pub use bridge::{relay, MessageBridge};
pub use command::{
    AnalyzeArgs, ChatArgs, Command, Dispatch, GenerateArgs, ProviderSettings, RequestLimits,
};
pub use panel::{PanelOutcome, PanelRequestContext};
pub use protocol::{parse_type, MessageKind, OutboundMessage, PanelEvent};
pub use router::{PanelConsumer, PanelRouter, RouteOutcome};
pub use sink::{EventSink, MpscSink};
