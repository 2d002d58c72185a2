pub mod codec;
pub mod index;
pub mod normalize;
pub mod reconcile;

pub use crate::domain::model::{Account, ImportEntry, List, MemberAddition};
pub use crate::domain::ports::Directory;
pub use crate::utils::error::Result;
