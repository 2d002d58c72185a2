pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::mastodon::MastodonDirectory;
pub use config::{Cli, Credentials};
pub use self::core::reconcile::Reconciler;
pub use domain::model::{Account, ImportEntry, List, MemberAddition};
pub use domain::ports::Directory;
pub use utils::error::{FedilistError, Result};
