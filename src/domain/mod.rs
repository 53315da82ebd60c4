// src/domain/mod.rs

pub mod announcement;
pub mod chat;
pub mod generation;
#[path = "match_.rs"]
pub mod r#match;
pub mod user;

pub use announcement::{Announcement, AnnouncementStatus, UserGroup};
pub use chat::{Chat, HistoryMessage};
pub use generation::{Generation, GenerationStatus, GenerationUsage, TaskRef};
pub use r#match::{Match, MatchStatus};
pub use user::{ProfileData, User, UserState, CURRENT_PROFILER_VERSION};
