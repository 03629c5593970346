//! bio.tools registry client and upload reporting

pub mod api;
pub mod upload;

pub use api::{read_token, ApiError, BioToolsApi, CreateOutcome, RemoteValidation};
pub use upload::{
    load_payload, upload_entries, write_upload_report_csv, UploadReport, UploadResult, UploadStatus,
};
