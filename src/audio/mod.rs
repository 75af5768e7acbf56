pub mod queue;
pub mod session;
pub mod sink;

pub use queue::{QueueEntry, QueueItemInfo, RequesterId, SessionId};
pub use session::{AdmitOutcome, EngineSettings, Session, SessionRegistry, SkipOutcome};
pub use sink::{PlaybackDone, PlaybackError, PlaybackResult, PlaybackSink};
