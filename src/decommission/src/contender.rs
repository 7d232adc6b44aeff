use crate::controller::Context;
use crate::model::{Application, Release, APP_LABEL};
use controller_core::{Error, Result};

use kube::ResourceExt;
use std::cmp::Reverse;
use tracing::{debug, instrument};

/// Rule picking the contender among an application's releases.
///
/// Releases are handed over newest first. The rule belongs to the promotion
/// strategy of the surrounding system, so it is injected rather than baked in.
pub trait ContenderSelector: Send + Sync {
    fn select_contender<'a>(&self, app: &Application, ordered: &'a [Release]) -> Result<&'a Release>;
}

/// The newest release is the contender
#[derive(Clone, Copy, Debug, Default)]
pub struct LatestGeneration;

impl ContenderSelector for LatestGeneration {
    fn select_contender<'a>(&self, app: &Application, ordered: &'a [Release]) -> Result<&'a Release> {
        ordered.first().ok_or_else(|| Error::ContenderNotFound {
            namespace: app.namespace().unwrap_or_default(),
            name: app.name_any(),
        })
    }
}

/// Newest generation first; releases without a readable generation go last.
pub fn sort_by_generation_descending(releases: &mut [Release]) {
    releases.sort_by_key(|release| Reverse(release.generation()));
}

pub fn app_selector(app_name: &str) -> String {
    format!("{APP_LABEL}={app_name}")
}

#[instrument(skip(ctx, app), fields(app = %app.name_any()))]
pub async fn resolve_contender(ctx: &Context, app: &Application) -> Result<Release> {
    let namespace = app.namespace().unwrap_or_default();
    let mut releases = ctx
        .store
        .list_releases(&namespace, Some(&app_selector(&app.name_any())))
        .await?;
    sort_by_generation_descending(&mut releases);

    let contender = ctx.selector.select_contender(app, &releases)?;
    debug!(
        "Contender of application {}/{} is {} (out of {} releases)",
        namespace,
        app.name_any(),
        contender.name_any(),
        releases.len(),
    );
    Ok(contender.clone())
}

/// Whether `release` is the contender of the application it is labelled with.
///
/// Contender-ship depends on the whole sibling set, so this always resolves
/// the application's contender and compares identities.
pub async fn is_contender(ctx: &Context, release: &Release) -> Result<bool> {
    let reference = release.reference();
    let Some(app_name) = release.app_name() else {
        return Err(Error::MissingAppLabel {
            namespace: reference.namespace,
            name: reference.name,
            label: APP_LABEL,
        });
    };
    let app = ctx.store.get_application(&reference.namespace, app_name).await?;
    let contender = resolve_contender(ctx, &app).await?;
    Ok(contender.reference() == reference)
}
