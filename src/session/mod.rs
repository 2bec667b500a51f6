pub mod manager;
pub mod state;

pub use manager::{FrameAnalysis, SessionManager, StartedSession};
pub use state::{
    FrameEntry, Session, SessionState, SessionStatistics, SessionStatusView, SessionSummary,
};
