pub mod accounts;
pub mod categories;
pub mod content;
pub mod engagement;
pub mod profiles;

pub use accounts::{AccountService, NewAccount};
pub use categories::{CategoryCounters, NoopCategoryCounters};
pub use content::{ContentFilter, ContentService, NewContentItem};
pub use engagement::EngagementService;
pub use profiles::{NewProfile, ProfilePatch, ProfileService};
