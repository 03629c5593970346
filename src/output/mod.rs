//! Report and payload artifacts

pub mod payload;
pub mod report;

pub use payload::{generate_biotools_id, review_payload_path, strip_null_fields, to_entry};
pub use report::{write_json, write_jsonl, write_report_csv, DecisionRow, CSV_COLUMNS};
