pub mod batch;
pub mod pocket;
pub mod rows;

pub use batch::{BatchImporter, BatchReport, RowOutcome};
pub use pocket::{
    ImportError, PagedSource, PocketClient, SourceError, SourceImporter, SourceRecord,
    SourceReport,
};
pub use rows::{parse_csv, parse_url_list, ImportRow};
