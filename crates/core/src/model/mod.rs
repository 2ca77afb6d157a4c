mod cell;
mod ids;
mod layout;
mod snapshot;
mod unit;

pub use cell::{normalize, CellValue};
pub use ids::{ColumnIndex, ParseIndexError, RowIndex};
pub use layout::{LearnerError, SheetLayout, DEFAULT_SUBJECT_ORDER};
pub use snapshot::Snapshot;
pub use unit::StudyUnit;
