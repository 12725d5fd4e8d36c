pub mod fields;
pub mod store;

pub use fields::{split_skills, FieldOverrides, ProfileFields};
pub use store::{PgProfileStore, ProfilePatch, ProfileStore, StoreError};
