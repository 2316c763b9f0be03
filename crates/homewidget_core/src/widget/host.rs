//! Render host: one provider per kind, driven by the reload signal.
//!
//! # Responsibility
//! - Resolve providers by kind for host-driven placeholder/snapshot/timeline.
//! - Regenerate exactly once per pending kind after reload signals.

use crate::config::WidgetDeployment;
use crate::model::entry::{Entry, Timeline};
use crate::store::SharedStore;
use crate::widget::provider::EntryProvider;
use crate::widget::reload::ReloadSignal;
use crate::widget::scheduler::RefreshScheduler;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Renderer-side registry of entry providers.
pub struct RenderHost<S: SharedStore + Clone> {
    providers: BTreeMap<String, EntryProvider<S>>,
    reload: Arc<ReloadSignal>,
}

impl<S: SharedStore + Clone> RenderHost<S> {
    /// Creates one provider per kind declared by `deployment`.
    pub fn new(deployment: &WidgetDeployment, store: S, reload: Arc<ReloadSignal>) -> Self {
        let scheduler = RefreshScheduler::from_deployment(deployment);
        let providers = deployment
            .kinds
            .iter()
            .map(|kind| {
                (
                    kind.kind.clone(),
                    EntryProvider::new(
                        store.clone(),
                        deployment.partition.clone(),
                        kind.clone(),
                        scheduler.clone(),
                    ),
                )
            })
            .collect();

        Self { providers, reload }
    }

    pub fn provider(&self, kind: &str) -> Option<&EntryProvider<S>> {
        self.providers.get(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn reload_signal(&self) -> &Arc<ReloadSignal> {
        &self.reload
    }

    pub fn placeholder(&self, kind: &str) -> Option<Entry> {
        self.provider(kind).map(EntryProvider::placeholder)
    }

    pub fn snapshot(&self, kind: &str) -> Option<Entry> {
        self.provider(kind).map(EntryProvider::snapshot)
    }

    pub fn timeline(&self, kind: &str) -> Option<Timeline> {
        self.provider(kind).map(EntryProvider::timeline)
    }

    /// Drains pending reloads and builds one timeline per pending kind.
    pub fn regenerate_pending(&self, now: DateTime<Utc>) -> Vec<(String, Timeline)> {
        let mut regenerated = Vec::new();
        for kind in self.reload.take_pending() {
            match self.providers.get(&kind) {
                Some(provider) => regenerated.push((kind, provider.timeline_at(now))),
                None => warn!(
                    "event=widget_regenerate module=widget status=skipped kind={} error_code=unknown_kind",
                    kind
                ),
            }
        }

        if !regenerated.is_empty() {
            info!(
                "event=widget_regenerate module=widget status=ok count={}",
                regenerated.len()
            );
        }
        regenerated
    }
}

#[cfg(test)]
mod tests {
    use super::RenderHost;
    use crate::config::WidgetDeployment;
    use crate::store::MemoryStore;
    use crate::widget::reload::ReloadSignal;
    use chrono::Utc;
    use std::sync::Arc;

    #[test]
    fn unknown_pending_kind_is_dropped() {
        let reload = Arc::new(ReloadSignal::new());
        let host = RenderHost::new(
            &WidgetDeployment::note_preset(),
            Arc::new(MemoryStore::new()),
            Arc::clone(&reload),
        );
        reload.signal("NotDeployed");
        assert!(host.regenerate_pending(Utc::now()).is_empty());
        assert!(!reload.is_pending("NotDeployed"));
    }

    #[test]
    fn unknown_kind_lookups_return_none() {
        let host = RenderHost::new(
            &WidgetDeployment::note_preset(),
            Arc::new(MemoryStore::new()),
            Arc::new(ReloadSignal::new()),
        );
        assert_eq!(host.kinds(), vec!["MyHomeWidget".to_string()]);
        assert!(host.snapshot("Other").is_none());
        assert!(host.placeholder("MyHomeWidget").is_some());
    }
}
