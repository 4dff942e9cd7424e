//! # Batched surface operations.
//!
//! Each helper is a pre-built operation submitted through
//! [`TaskScheduler::schedule`] with the batch flag set. Mutations drop the
//! selector results they may have made stale.

use std::sync::{Arc, PoisonError};

use super::{TaskOptions, TaskScheduler};
use crate::error::{Failure, ScheduleError};
use crate::host::{ElementId, ElementPatch, Surface};

impl TaskScheduler {
    fn surface(&self) -> Result<Arc<dyn Surface>, ScheduleError> {
        self.inner
            .surface
            .as_ref()
            .map(Arc::clone)
            .ok_or(ScheduleError::NoSurface)
    }

    /// Appends every child to `parent` in one task.
    pub fn append_many(
        &self,
        parent: ElementId,
        children: Vec<ElementId>,
        opts: TaskOptions,
    ) -> Result<String, ScheduleError> {
        let surface = self.surface()?;
        let me = self.clone();
        self.schedule(
            move || {
                for child in children {
                    surface.append(parent, child)?;
                }
                me.invalidate_all();
                Ok::<_, Failure>(())
            },
            opts.batch(),
        )
    }

    /// Detaches every element in one task.
    pub fn remove_many(
        &self,
        elements: Vec<ElementId>,
        opts: TaskOptions,
    ) -> Result<String, ScheduleError> {
        let surface = self.surface()?;
        let me = self.clone();
        self.schedule(
            move || {
                for el in elements {
                    surface.remove(el)?;
                }
                me.invalidate_all();
                Ok::<_, Failure>(())
            },
            opts.batch(),
        )
    }

    /// Applies every patch in one task.
    pub fn update_many(
        &self,
        updates: Vec<(ElementId, ElementPatch)>,
        opts: TaskOptions,
    ) -> Result<String, ScheduleError> {
        let surface = self.surface()?;
        let me = self.clone();
        self.schedule(
            move || {
                for (el, patch) in &updates {
                    if patch.is_empty() {
                        continue;
                    }
                    surface.patch(*el, patch)?;
                    me.invalidate(*el);
                }
                Ok::<_, Failure>(())
            },
            opts.batch(),
        )
    }

    /// Resolves `selector` through the surface, served from the cache while fresh.
    pub fn query(&self, selector: &str) -> Result<Vec<ElementId>, Failure> {
        let surface = self.surface().map_err(Failure::from)?;
        let now = self.inner.host.now();
        if let Some(hit) = self.cache().get(selector, now) {
            return Ok(hit);
        }
        let found = surface.query(selector)?;
        self.cache().insert(selector, found.clone(), now);
        Ok(found)
    }

    /// Drops cached results that contain `element`.
    pub fn invalidate(&self, element: ElementId) -> usize {
        self.cache().invalidate(element)
    }

    /// Drops every cached result.
    pub fn invalidate_all(&self) {
        self.cache().clear();
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, super::SelectorCache> {
        self.inner
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::FailureBoundary;
    use crate::config::Config;
    use crate::events::EventChannel;
    use crate::host::TokioHost;
    use crate::registry::ConcurrencyRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Dom {
        ops: Mutex<Vec<String>>,
        queries: AtomicUsize,
    }

    impl Surface for Dom {
        fn append(&self, parent: ElementId, child: ElementId) -> Result<(), Failure> {
            self.ops.lock().unwrap().push(format!("append {child} to {parent}"));
            Ok(())
        }

        fn remove(&self, element: ElementId) -> Result<(), Failure> {
            if element == ElementId(99) {
                return Err(Failure::new("detached"));
            }
            self.ops.lock().unwrap().push(format!("remove {element}"));
            Ok(())
        }

        fn patch(&self, element: ElementId, _: &ElementPatch) -> Result<(), Failure> {
            self.ops.lock().unwrap().push(format!("patch {element}"));
            Ok(())
        }

        fn query(&self, _: &str) -> Result<Vec<ElementId>, Failure> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ElementId(1), ElementId(2)])
        }

        fn reveal(&self, _: ElementId) -> Result<(), Failure> {
            Ok(())
        }
    }

    fn scheduler(surface: Option<Arc<dyn Surface>>) -> (TaskScheduler, Arc<FailureBoundary>) {
        let bus = EventChannel::new();
        let cfg = Config::default();
        let boundary = Arc::new(FailureBoundary::new(bus.clone(), &cfg));
        let s = TaskScheduler::new(
            Arc::new(TokioHost::new()),
            ConcurrencyRegistry::new(bus.clone(), cfg.tier),
            Arc::clone(&boundary),
            bus,
            surface,
            &cfg,
        );
        (s, boundary)
    }

    #[tokio::test(start_paused = true)]
    async fn batch_operations_run_as_single_tasks() {
        let dom = Arc::new(Dom::default());
        let (s, _) = scheduler(Some(dom.clone()));
        s.append_many(ElementId(0), vec![ElementId(1), ElementId(2)], TaskOptions::new())
            .unwrap();
        s.update_many(
            vec![
                (ElementId(1), ElementPatch::new().add_class("visible")),
                (ElementId(2), ElementPatch::new()),
            ],
            TaskOptions::new(),
        )
        .unwrap();
        s.remove_many(vec![ElementId(2)], TaskOptions::new()).unwrap();
        assert_eq!(s.pending_count(), 3);

        s.wait_idle().await;
        assert_eq!(
            *dom.ops.lock().unwrap(),
            vec!["append el-1 to el-0", "append el-2 to el-0", "patch el-1", "remove el-2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failing_batch_reports_through_boundary() {
        let dom = Arc::new(Dom::default());
        let (s, boundary) = scheduler(Some(dom));
        s.remove_many(vec![ElementId(99)], TaskOptions::new()).unwrap();
        s.wait_idle().await;
        assert_eq!(boundary.records().len(), 1);
        assert_eq!(s.stats().failed, 1);
    }

    #[test]
    fn queries_are_cached_until_invalidated() {
        let dom = Arc::new(Dom::default());
        let (s, _) = scheduler(Some(dom.clone()));
        assert_eq!(s.query(".card").unwrap().len(), 2);
        s.query(".card").unwrap();
        assert_eq!(dom.queries.load(Ordering::SeqCst), 1);

        assert_eq!(s.invalidate(ElementId(2)), 1);
        s.query(".card").unwrap();
        assert_eq!(dom.queries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn batch_operations_need_a_surface() {
        let (s, _) = scheduler(None);
        assert_eq!(
            s.remove_many(vec![ElementId(1)], TaskOptions::new()),
            Err(ScheduleError::NoSurface)
        );
        assert!(s.query(".x").is_err());
    }
}
