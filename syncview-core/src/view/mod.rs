//! Display projection of the model: sorted, filtered and indexed.

mod entity;
mod filter;
mod options;
mod projector;
mod sort;

pub use entity::{ViewEntity, ViewStatus};
pub use filter::{AllOf, NameFilter, StatusFilter, ViewFilter};
pub use options::{ViewOptions, ViewOptionsService};
pub use projector::{ViewList, ViewProjector};
pub use sort::{Comparator, SortMethod, by_name_ascending, by_name_descending, by_status};
