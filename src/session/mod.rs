//! Voice interview session: the Turn Coordinator and its runtime.
//!
//! * [`SessionController`] is the state machine.  Commands and collaborator
//!   events go in, [`Effect`]s come out; it owns the transcript, counters and
//!   the [`RecognitionDriver`](crate::speech::RecognitionDriver).
//! * [`SessionRunner`] executes effects against the microphone, recognizer,
//!   synthesizer, model and preference store, and publishes a
//!   [`SessionSnapshot`] plus [`SessionUpdate`]s.
//! * [`TimerSet`] provides the keyed, cancellable one-shot timers.
//!
//! ```text
//! front-end ──SessionHandle──▶ SessionRunner ──▶ SessionController
//!     ▲                              │                   │
//!     └──── SharedSnapshot / updates ┘◀──── Vec<Effect> ─┘
//! ```

pub mod coordinator;
pub mod effect;
pub mod event;
pub mod runner;
pub mod state;
pub mod timers;

pub use coordinator::{
    inference_advisory, SessionController, MIC_ACCESS_ADVISORY, MIC_SWITCH_ADVISORY,
};
pub use effect::{AcquirePurpose, Effect};
pub use event::{SessionCommand, SessionEvent, StartOptions};
pub use runner::{SessionClosed, SessionHandle, SessionParts, SessionRequest, SessionRunner};
pub use state::{new_shared_snapshot, SessionSnapshot, SessionState, SessionUpdate, SharedSnapshot};
pub use timers::TimerSet;
