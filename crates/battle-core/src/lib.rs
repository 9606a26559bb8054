pub mod merge;
pub mod model;
pub mod protocol;
pub mod rating;

pub use merge::{merge, StatusWrite};
pub use model::{MatchResult, MatchState, Player, Problem, ProblemStatus, Verdict};
pub use protocol::{ClientMessage, ServerMessage};
