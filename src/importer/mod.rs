//! Upload ingestion: tabular file I/O, mapping guesses, normalization,
//! id reconciliation.

pub mod io;
pub mod mapping;
pub mod normalize;
pub mod reconcile;

pub use io::{load_df, load_df_lazy, save_df};
pub use mapping::{FieldMapping, guess};
pub use normalize::normalize;
pub use reconcile::reconcile_ids;
