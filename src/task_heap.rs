//! Binary min-heap of pending timer dispatches.
//!
//! Ordered by deadline, then by submission sequence, so tasks with equal
//! deadlines run in the order they were queued. The heap itself is not
//! synchronized; the timer keeps it behind its queue mutex.

use std::time::Instant;

use crate::timer_task::TimerTask;

#[derive(Debug)]
pub(crate) struct Pending {
    pub(crate) when: Instant,
    seq: u64,
    pub(crate) task: TimerTask,
}

impl Pending {
    #[inline]
    fn precedes(&self, other: &Pending) -> bool {
        (self.when, self.seq) < (other.when, other.seq)
    }
}

#[derive(Debug)]
pub(crate) struct TaskHeap {
    nodes: Vec<Pending>,
    next_seq: u64,
}

impl TaskHeap {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            next_seq: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn push(&mut self, when: Instant, task: TimerTask) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.nodes.push(Pending { when, seq, task });
        self.sift_up(self.nodes.len() - 1);
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<&Pending> {
        self.nodes.first()
    }

    /// Remove and return the earliest dispatch.
    pub(crate) fn pop(&mut self) -> Option<Pending> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(self.remove(0))
        }
    }

    /// Remove the node at `pos`: the last node takes its place and is
    /// sifted whichever way restores heap order.
    pub(crate) fn remove(&mut self, pos: usize) -> Pending {
        let removed = self.nodes.swap_remove(pos);
        if pos < self.nodes.len() {
            if pos > 0 && self.nodes[pos].precedes(&self.nodes[(pos - 1) / 2]) {
                self.sift_up(pos);
            } else {
                self.sift_down(pos);
            }
        }
        removed
    }

    /// Drop every node whose task has been cancelled. Returns how many
    /// were removed.
    pub(crate) fn purge_cancelled(&mut self) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|n| !n.task.is_cancelled());
        let removed = before - self.nodes.len();
        if removed > 0 {
            self.heapify();
        }
        removed
    }

    /// Restore heap order over arbitrary contents, bottom-up.
    fn heapify(&mut self) {
        for parent in (0..self.nodes.len() / 2).rev() {
            self.sift_down(parent);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }

    fn sift_up(&mut self, mut child: usize) {
        while child > 0 {
            let parent = (child - 1) / 2;
            if !self.nodes[child].precedes(&self.nodes[parent]) {
                break;
            }
            self.nodes.swap(child, parent);
            child = parent;
        }
    }

    fn sift_down(&mut self, mut parent: usize) {
        let len = self.nodes.len();
        loop {
            let left = 2 * parent + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let min = if right < len && self.nodes[right].precedes(&self.nodes[left]) {
                right
            } else {
                left
            };
            if !self.nodes[min].precedes(&self.nodes[parent]) {
                break;
            }
            self.nodes.swap(parent, min);
            parent = min;
        }
    }

    #[cfg(test)]
    fn assert_heap_order(&self) {
        for i in 1..self.nodes.len() {
            assert!(
                !self.nodes[i].precedes(&self.nodes[(i - 1) / 2]),
                "node {i} precedes its parent"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn task() -> TimerTask {
        TimerTask::new(|| {})
    }

    #[test]
    fn pops_in_deadline_order() {
        let t0 = Instant::now();
        let mut h = TaskHeap::with_capacity(2);
        for ms in [50u64, 10, 30, 20, 40] {
            h.push(t0 + Duration::from_millis(ms), task());
        }
        assert_eq!(h.len(), 5);
        let order: Vec<u64> = std::iter::from_fn(|| h.pop())
            .map(|p| (p.when - t0).as_millis() as u64)
            .collect();
        assert_eq!(order, vec![10, 20, 30, 40, 50]);
        assert!(h.is_empty());
    }

    #[test]
    fn equal_deadlines_keep_submission_order() {
        let when = Instant::now();
        let tasks: Vec<TimerTask> = (0..8).map(|_| task()).collect();
        let mut h = TaskHeap::with_capacity(8);
        for t in &tasks {
            h.push(when, t.clone());
        }
        for t in &tasks {
            let p = h.pop().unwrap();
            assert!(p.task.same_task(t));
        }
    }

    #[test]
    fn purge_drops_only_cancelled_tasks() {
        let t0 = Instant::now();
        let mut h = TaskHeap::with_capacity(16);
        let tasks: Vec<TimerTask> = (0..10).map(|_| task()).collect();
        for (i, t) in tasks.iter().enumerate() {
            h.push(t0 + Duration::from_millis(i as u64), t.clone());
        }
        for t in tasks.iter().step_by(3) {
            t.cancel();
        }
        assert_eq!(h.purge_cancelled(), 4);
        assert_eq!(h.purge_cancelled(), 0);
        assert_eq!(h.len(), 6);
        h.assert_heap_order();
    }

    #[test]
    fn purging_most_of_a_large_heap_keeps_order() {
        let t0 = Instant::now();
        let mut h = TaskHeap::with_capacity(16);
        let tasks: Vec<TimerTask> = (0..500).map(|_| task()).collect();
        for (i, t) in tasks.iter().enumerate() {
            h.push(t0 + Duration::from_millis((i * 7919 % 500) as u64), t.clone());
        }
        for t in tasks.iter().skip(1).step_by(2) {
            t.cancel();
        }
        for t in tasks.iter().step_by(5) {
            t.cancel();
        }
        let live = tasks.iter().filter(|t| !t.is_cancelled()).count();
        assert_eq!(h.purge_cancelled(), 500 - live);
        assert_eq!(h.len(), live);
        h.assert_heap_order();
        let drained: Vec<Instant> = std::iter::from_fn(|| h.pop()).map(|p| p.when).collect();
        assert!(drained.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(drained.len(), live);
    }

    proptest! {
        #[test]
        fn arbitrary_removal_keeps_heap_order(
            deadlines in proptest::collection::vec(0u64..1_000, 1..64),
            removals in proptest::collection::vec(any::<prop::sample::Index>(), 0..32),
        ) {
            let t0 = Instant::now();
            let mut h = TaskHeap::with_capacity(4);
            let mut model: Vec<u64> = Vec::new();
            for d in &deadlines {
                h.push(t0 + Duration::from_millis(*d), task());
                model.push(*d);
            }
            for ix in removals {
                if h.is_empty() {
                    break;
                }
                let pos = ix.index(h.len());
                let gone = h.remove(pos);
                let ms = (gone.when - t0).as_millis() as u64;
                let at = model.iter().position(|m| *m == ms).unwrap();
                model.swap_remove(at);
                h.assert_heap_order();
            }
            model.sort_unstable();
            let drained: Vec<u64> = std::iter::from_fn(|| h.pop())
                .map(|p| (p.when - t0).as_millis() as u64)
                .collect();
            prop_assert_eq!(drained, model);
        }
    }
}
