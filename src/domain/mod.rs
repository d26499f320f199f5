pub mod canon;
pub mod chapter;
pub mod position;
pub mod search;
pub mod stats;
pub mod version;

pub use canon::{CanonBook, Testament, CANON};
pub use chapter::{ChapterContent, ChapterKey, Verse};
pub use position::{ChapterId, ChapterRef, ReadingPosition};
pub use search::{MatchKind, SearchResult};
pub use stats::ProgressStats;
pub use version::VersionDescriptor;
