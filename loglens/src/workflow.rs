//! The upload workflow controller.
//!
//! One run is a linear chain: upload, evaluate, fetch stats, render. Each
//! step yields a typed result and the first failure ends the run. The
//! pending form state is held by a drop guard, so the form is restored
//! exactly once whichever way the run ends, including a panic inside a view
//! or the run's future being dropped mid-flight.

use std::ops::{Deref, DerefMut};

use tracing::{debug, error};

use crate::api::AnalysisApi;
use crate::render::{plan_plots, plan_stats};
use crate::view::{Notification, View, ViewState};
use crate::{LensError, PlotsBundle, UploadResult};

pub const SUCCESS_MESSAGE: &str = "Log file uploaded and analyzed successfully!";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Uploading,
    FetchingPlots,
    Rendering,
    Done,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    /// `Done` or `Failed`.
    pub stage: Stage,
    /// The stage that was active when the run failed.
    pub failed_during: Option<Stage>,
    pub error: Option<LensError>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.stage == Stage::Done
    }
}

struct PendingGuard<'a, V: View> {
    view: &'a mut V,
}

impl<'a, V: View> PendingGuard<'a, V> {
    fn enter(view: &'a mut V) -> Self {
        view.apply_state(&ViewState::pending());
        PendingGuard { view }
    }
}

impl<V: View> Deref for PendingGuard<'_, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &*self.view
    }
}

impl<V: View> DerefMut for PendingGuard<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut *self.view
    }
}

impl<V: View> Drop for PendingGuard<'_, V> {
    fn drop(&mut self) {
        self.view.apply_state(&ViewState::idle());
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = ?*stage, to = ?next, "upload workflow stage");
    *stage = next;
}

pub struct UploadWorkflow<A> {
    api: A,
}

impl<A: AnalysisApi> UploadWorkflow<A> {
    pub fn new(api: A) -> Self {
        UploadWorkflow { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Run one submission to completion. Exactly one notification is issued.
    pub async fn run<V: View>(&self, form: A::Form, view: &mut V) -> RunReport {
        let mut view = PendingGuard::enter(view);
        let mut stage = Stage::Pending;

        let outcome = self.drive(form, &mut *view, &mut stage).await;

        let report = match outcome {
            Ok(()) => {
                view.notify(Notification::success(SUCCESS_MESSAGE));
                advance(&mut stage, Stage::Done);
                RunReport { stage, failed_during: None, error: None }
            }
            Err(err) => {
                if err.is_unexpected() {
                    error!(during = ?stage, "upload workflow failed: {err}");
                } else {
                    debug!(during = ?stage, "upload workflow rejected: {err}");
                }
                view.notify(Notification::danger(err.user_message()));
                let failed_during = stage;
                advance(&mut stage, Stage::Failed);
                RunReport { stage, failed_during: Some(failed_during), error: Some(err) }
            }
        };
        drop(view);
        report
    }

    async fn drive<V: View>(
        &self,
        form: A::Form,
        view: &mut V,
        stage: &mut Stage,
    ) -> Result<(), LensError> {
        advance(stage, Stage::Uploading);
        let body = self.api.upload(form).await?;
        let uploaded = UploadResult::from_body(&body)?.into_uploaded()?;

        view.reveal_results();
        view.patch(plan_stats(&uploaded.stats));

        advance(stage, Stage::FetchingPlots);
        let body = self.api.fetch_stats(&uploaded.filename).await?;
        let plots = PlotsBundle::from_body(&body)?;
        if let Some(message) = plots.error.clone() {
            return Err(LensError::Rejected(message));
        }

        advance(stage, Stage::Rendering);
        for patch in plan_plots(&plots) {
            view.patch(patch);
        }
        Ok(())
    }
}
