pub mod error;
mod loader;
pub mod models;
pub mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use models::{
    BuildErrorPolicy, BuildReport, Destination, Plan, PlanSource, Rate, StoreState, TableLoad,
    ZoneSummary,
};
pub use schema::{ColumnSchema, ColumnType, Schema, TableSchema};
pub use store::{PlanStore, PlanStoreBuilder};
