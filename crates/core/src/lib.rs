pub mod clock;
pub mod config;
pub mod domain;
pub mod engagement;
pub mod errors;
pub mod insights;
pub mod intent;
pub mod lines;
pub mod render;
pub mod session;
pub mod text;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::event::{Event, EventKind, NewEvent};
pub use domain::feedback::{Feedback, PmfScore, QuickReaction, ReactionAction};
pub use domain::record::{NewRecord, Record, RecordPage, UserId};
pub use engagement::{NudgeKind, PmfEligibility, PmfPolicy};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use intent::{resolve, CommandResolver, Intent, IntentKind, LineMatcher};
pub use lines::split_lines;
pub use session::SessionStore;
pub use text::{normalize_key, to_plain_spaces};
