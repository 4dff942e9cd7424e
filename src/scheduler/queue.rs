//! Priority queue of pending tasks.
//!
//! Keys are `(Reverse(priority), seq)`: the first key is always the highest
//! priority, and within one priority the earliest enqueued.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::task::Task;
use crate::policies::Priority;

pub(crate) type QueueKey = (Reverse<Priority>, u64);

#[derive(Default)]
pub(crate) struct TaskQueue {
    tasks: BTreeMap<QueueKey, Task>,
}

impl TaskQueue {
    pub(crate) fn key(priority: Priority, seq: u64) -> QueueKey {
        (Reverse(priority), seq)
    }

    pub(crate) fn push(&mut self, task: Task) -> QueueKey {
        let key = Self::key(task.priority, task.seq);
        self.tasks.insert(key, task);
        key
    }

    pub(crate) fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_first().map(|(_, t)| t)
    }

    pub(crate) fn remove(&mut self, key: &QueueKey) -> Option<Task> {
        self.tasks.remove(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ids in drain order.
    #[cfg(test)]
    pub(crate) fn order(&self) -> Vec<&str> {
        self.tasks.values().map(|t| t.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskOptions;
    use tokio::time::Instant;

    fn task(id: &str, priority: Priority, seq: u64) -> Task {
        let opts = TaskOptions::new();
        Task {
            id: id.to_string(),
            op: Box::new(|| Ok(())),
            priority,
            seq,
            created_at: Instant::now(),
            batch: false,
            on_complete: None,
            on_error: None,
            context: opts.context,
        }
    }

    #[test]
    fn priority_first_then_fifo() {
        let mut q = TaskQueue::default();
        q.push(task("low", Priority::Low, 0));
        q.push(task("n1", Priority::Normal, 1));
        q.push(task("high", Priority::High, 2));
        q.push(task("n2", Priority::Normal, 3));
        assert_eq!(q.order(), vec!["high", "n1", "n2", "low"]);

        assert_eq!(q.pop().map(|t| t.id), Some("high".to_string()));
        assert!(q.remove(&TaskQueue::key(Priority::Normal, 3)).is_some());
        assert_eq!(q.order(), vec!["n1", "low"]);
    }
}
