pub mod postgres;
pub mod title_store;

pub use postgres::{create_pool, PgTitleStore};
#[cfg(test)]
pub use title_store::MockTitleStore;
pub use title_store::{
    normalize_column_name, FilterValue, Projection, TitleQuery, TitleStore, PRIMARY_KEY_COLUMN,
    TITLE_COLUMNS,
};
