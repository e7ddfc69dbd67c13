use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::debug;
use url::Url;

use crate::api::{AnalysisApi, UploadForm};
use crate::LensError;

/// [`AnalysisApi`] over HTTP with `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpApi {
    pub fn new(base: &str) -> Result<Self, LensError> {
        Self::with_timeout(base, None)
    }

    /// `timeout` bounds each request; `None` waits indefinitely.
    pub fn with_timeout(base: &str, timeout: Option<Duration>) -> Result<Self, LensError> {
        let mut base = Url::parse(base).map_err(|e| LensError::Config(format!("{base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(LensError::Config(format!("{base}: not a base URL")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| LensError::Config(e.to_string()))?;
        Ok(HttpApi { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn upload_url(&self) -> Result<Url, LensError> {
        self.base.join("upload").map_err(|e| LensError::Config(e.to_string()))
    }

    /// The filename becomes a single, percent-encoded path segment.
    pub fn stats_url(&self, filename: &str) -> Result<Url, LensError> {
        let mut url = self.base.join("get_stats/").map_err(|e| LensError::Config(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| LensError::Config(format!("{}: not a base URL", self.base)))?
            .pop_if_empty()
            .push(filename);
        Ok(url)
    }
}

fn transport(err: reqwest::Error) -> LensError {
    LensError::Transport(err.to_string())
}

impl AnalysisApi for HttpApi {
    type Form = UploadForm;

    async fn upload(&self, form: UploadForm) -> Result<String, LensError> {
        let url = self.upload_url()?;
        let mut multipart = Form::new();
        for (name, value) in form.fields {
            multipart = multipart.text(name, value);
        }
        let size = form.bytes.len();
        let file = Part::bytes(form.bytes).file_name(form.file_name.clone());
        multipart = multipart.part("file", file);

        debug!(%url, file = %form.file_name, size, "uploading log file");
        let response = self
            .client
            .post(url)
            .multipart(multipart)
            .send()
            .await
            .map_err(transport)?;
        debug!(status = %response.status(), "upload answered");
        response.text().await.map_err(transport)
    }

    async fn fetch_stats(&self, filename: &str) -> Result<String, LensError> {
        let url = self.stats_url(filename)?;
        debug!(%url, "fetching stats");
        let response = self.client.get(url).send().await.map_err(transport)?;
        debug!(status = %response.status(), "stats answered");
        response.text().await.map_err(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_hang_off_the_base() {
        let api = HttpApi::new("http://127.0.0.1:5000").unwrap();
        assert_eq!(api.upload_url().unwrap().as_str(), "http://127.0.0.1:5000/upload");
        assert_eq!(
            api.stats_url("app.log").unwrap().as_str(),
            "http://127.0.0.1:5000/get_stats/app.log"
        );
    }

    #[test]
    fn base_path_is_kept() {
        let api = HttpApi::new("https://logs.example.com/analyzer").unwrap();
        assert_eq!(api.base().as_str(), "https://logs.example.com/analyzer/");
        assert_eq!(
            api.upload_url().unwrap().as_str(),
            "https://logs.example.com/analyzer/upload"
        );
    }

    #[test]
    fn filenames_are_encoded_as_one_segment() {
        let api = HttpApi::new("http://localhost:5000/").unwrap();
        assert_eq!(
            api.stats_url("my app/2024 #1.log").unwrap().as_str(),
            "http://localhost:5000/get_stats/my%20app%2F2024%20%231.log"
        );
    }

    #[test]
    fn bad_base_is_a_config_error() {
        assert!(matches!(HttpApi::new("not a url"), Err(LensError::Config(_))));
        assert!(matches!(HttpApi::new("mailto:ops@example.com"), Err(LensError::Config(_))));
    }
}
