use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::future::Future;
use std::sync::Arc;
use tankobon_cache::{CrawlerHandle, HandleCache};
use tracing::Instrument;

/// What one site answered during an aggregate query.
#[derive(Debug)]
pub struct SiteOutcome<T> {
    pub site: String,
    pub result: Result<T>,
}

/// Per-site outcomes of an aggregate query, in target order.
///
/// Unsupported sites never appear here. A site that was queried but failed
/// does, with its error, so one bad site never hides the others' answers.
#[derive(Debug)]
pub struct Aggregate<T> {
    outcomes: Vec<SiteOutcome<T>>,
}

impl<T> Aggregate<T> {
    pub fn outcomes(&self) -> &[SiteOutcome<T>] {
        &self.outcomes
    }

    pub fn sites(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().map(|o| o.site.as_str())
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok().map(|value| (o.site.as_str(), value)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ErrorKind)> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err().map(|err| (o.site.as_str(), &**err)))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Every site's value, or the first failure in target order.
    pub fn into_results(self) -> Result<Vec<T>> {
        self.outcomes.into_iter().map(|o| o.result).collect()
    }
}

impl<T> IntoIterator for Aggregate<T> {
    type Item = SiteOutcome<T>;
    type IntoIter = std::vec::IntoIter<SiteOutcome<T>>;
    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

/// Run `query` against a site-level handle for every site in `targets`, one
/// task per site, and wait for all of them.
///
/// Tasks run to completion; nothing here times out or cancels them.
pub(crate) async fn fan_out<T, F, Fut>(cache: &Arc<HandleCache>, targets: Vec<String>, query: F) -> Aggregate<T>
where
    T: Send + 'static,
    F: Fn(CrawlerHandle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let query = Arc::new(query);
    let tasks: Vec<_> = targets
        .into_iter()
        .map(|site| {
            let cache = Arc::clone(cache);
            let query = Arc::clone(&query);
            let span = tracing::debug_span!("site", site = site.as_str());
            let task_site = site.clone();
            let task = tokio::spawn(
                async move {
                    let handle = crate::service::handle(&cache, &task_site, None).await?;
                    query(handle).await
                }
                .instrument(span),
            );
            (site, task)
        })
        .collect();
    tracing::debug!(sites = tasks.len(), "Dispatched aggregate query");

    // Awaited in target order; completion order doesn't matter.
    let mut outcomes = Vec::with_capacity(tasks.len());
    for (site, task) in tasks {
        let result = task.await.or_raise(|| ErrorKind::Task).and_then(|result| result);
        if let Err(err) = &result {
            let kind: &ErrorKind = err;
            tracing::warn!(site = site.as_str(), error = %kind, "Site failed during aggregate query");
        }
        outcomes.push(SiteOutcome { site, result });
    }
    Aggregate { outcomes }
}
