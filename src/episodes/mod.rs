pub mod extract;
pub mod select;

pub use extract::{extract, extract_bytes, is_uuid, Episode};
pub use select::{filter_episodes, select_episode};
