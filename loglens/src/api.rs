//! The transport seam between the workflow and the analysis server.

use std::cell::RefCell;

use crate::LensError;

/// A multipart upload: the log file plus any sibling form fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadForm {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub fields: Vec<(String, String)>,
}

impl UploadForm {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadForm { file_name: file_name.into(), bytes, fields: Vec::new() }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// Both calls yield the raw response body whatever the HTTP status: the
/// server reports business failures as JSON with an `error` field on 4xx/5xx.
/// Only transport failures are errors here.
#[allow(async_fn_in_trait)]
pub trait AnalysisApi {
    type Form;

    /// `POST /upload`
    async fn upload(&self, form: Self::Form) -> Result<String, LensError>;

    /// `GET /get_stats/{filename}`
    async fn fetch_stats(&self, filename: &str) -> Result<String, LensError>;
}

/// Serves previously captured response bodies and records what was asked.
#[derive(Debug)]
pub struct ReplayApi {
    upload: Result<String, LensError>,
    stats: Result<String, LensError>,
    requests: RefCell<Vec<String>>,
}

impl ReplayApi {
    pub fn new(upload: Result<String, LensError>, stats: Result<String, LensError>) -> Self {
        ReplayApi { upload, stats, requests: RefCell::new(Vec::new()) }
    }

    /// Request paths in call order, e.g. `["upload", "get_stats/a.log"]`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl AnalysisApi for ReplayApi {
    type Form = ();

    async fn upload(&self, _form: ()) -> Result<String, LensError> {
        self.requests.borrow_mut().push("upload".to_string());
        self.upload.clone()
    }

    async fn fetch_stats(&self, filename: &str) -> Result<String, LensError> {
        self.requests.borrow_mut().push(format!("get_stats/{filename}"));
        self.stats.clone()
    }
}
