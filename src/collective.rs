//! Collective operations between a fixed set of workers.
//!
//! Every worker runs the same program and meets its peers at each collective.
//! A collective completes only once all `world_size` workers have entered it,
//! and two collectives never overlap: the next round cannot start filling
//! until every worker has read the previous round's result.

use crate::error::KMeansError;
use crate::partition::Chunk;
use ndarray::{s, Array1};
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A fixed-shape record that can be summed element-wise across workers.
///
/// `combine` must be associative and commutative up to floating-point rounding.
/// [`Communicator::all_reduce`] always folds in rank order so the rounding is
/// the same on every worker.
pub trait Reduce: Clone + Send + Sync + 'static {
    fn combine(&mut self, other: &Self);
}

/// Abstraction for the collectives needed by distributed k-means
pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;
    fn world_size(&self) -> usize;

    /// Exchange one value per worker. Every worker receives all values in rank order.
    fn all_gather<T: Clone + Send + Sync + 'static>(&self, value: T) -> Result<Vec<T>, KMeansError>;

    /// Poison the group: blocked and future collectives on every worker fail.
    fn abort(&self, reason: &str);

    /// Total time this worker has spent inside collectives
    fn comm_time(&self) -> Duration {
        Duration::ZERO
    }

    /// Block until every worker has reached this point
    fn barrier(&self) -> Result<(), KMeansError> {
        self.all_gather(()).map(|_| ())
    }

    /// Distribute the root's value to every worker. Non-root workers pass `None`.
    fn broadcast<T: Clone + Send + Sync + 'static>(
        &self,
        root: usize,
        value: Option<T>,
    ) -> Result<T, KMeansError> {
        let mut gathered = self.all_gather(value)?;
        gathered
            .get_mut(root)
            .and_then(Option::take)
            .ok_or_else(|| KMeansError::WorkerFailed {
                rank: root,
                reason: "root contributed nothing to broadcast".to_string(),
            })
    }

    /// Hand every worker a private copy of its chunk of the root's dataset
    fn scatter(
        &self,
        root: usize,
        data: Option<Arc<Array1<f64>>>,
        chunks: &[Chunk],
    ) -> Result<Array1<f64>, KMeansError> {
        let data = self.broadcast(root, data)?;
        let chunk = chunks.get(self.rank()).ok_or_else(|| {
            KMeansError::InvalidConfig(format!(
                "no chunk for rank {} ({} chunks)",
                self.rank(),
                chunks.len()
            ))
        })?;
        if chunk.offset + chunk.size > data.len() {
            return Err(KMeansError::InvalidInput(format!(
                "chunk {:?} exceeds dataset of {} points",
                chunk.range(),
                data.len()
            )));
        }
        Ok(data.slice(s![chunk.range()]).to_owned())
    }

    /// Combine one record per worker into a single result held by every worker.
    ///
    /// Each worker folds the gathered records itself, in rank order, so no
    /// worker acts as a coordinator and all replicas get the same bits.
    fn all_reduce<R: Reduce>(&self, value: R) -> Result<R, KMeansError> {
        let mut gathered = self.all_gather(value)?.into_iter();
        let mut acc = gathered.next().ok_or_else(|| {
            KMeansError::InvalidConfig("all_reduce over an empty worker group".to_string())
        })?;
        for other in gathered {
            acc.combine(&other);
        }
        Ok(acc)
    }
}

type Payload = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct RoundState {
    slots: Vec<Option<Payload>>,
    arrived: usize,
    departed: usize,
    // set when every worker has contributed; cleared once every worker has read
    draining: bool,
    generation: u64,
    aborted: Option<(usize, String)>,
}

struct Shared {
    state: Mutex<RoundState>,
    cv: Condvar,
}

/// In-process communicator: one endpoint per worker thread, sharing round state
pub struct LocalCommunicator {
    rank: usize,
    world: usize,
    shared: Arc<Shared>,
    comm_nanos: AtomicU64,
}

impl LocalCommunicator {
    /// Create the `world` endpoints of one worker group, indexed by rank
    pub fn new_group(world: usize) -> Vec<LocalCommunicator> {
        let shared = Arc::new(Shared {
            state: Mutex::new(RoundState {
                slots: vec![None; world],
                ..Default::default()
            }),
            cv: Condvar::new(),
        });

        (0..world)
            .map(|rank| LocalCommunicator {
                rank,
                world,
                shared: shared.clone(),
                comm_nanos: AtomicU64::new(0),
            })
            .collect()
    }

    // A poisoned lock means a peer panicked; the abort flag reports it.
    fn lock(&self) -> MutexGuard<'_, RoundState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, RoundState>) -> MutexGuard<'a, RoundState> {
        self.shared
            .cv
            .wait(guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_aborted(state: &RoundState) -> Result<(), KMeansError> {
        match &state.aborted {
            Some((rank, reason)) => Err(KMeansError::WorkerFailed {
                rank: *rank,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn exchange(&self, value: Payload) -> Result<Vec<Payload>, KMeansError> {
        let mut guard = self.lock();

        // Previous round still being read by a slower peer
        while guard.draining && guard.aborted.is_none() {
            guard = self.wait(guard);
        }
        Self::check_aborted(&guard)?;

        guard.slots[self.rank] = Some(value);
        guard.arrived += 1;

        if guard.arrived == self.world {
            guard.draining = true;
            self.shared.cv.notify_all();
        } else {
            let generation = guard.generation;
            while !(guard.draining && guard.generation == generation) && guard.aborted.is_none() {
                guard = self.wait(guard);
            }
        }
        Self::check_aborted(&guard)?;

        let gathered = guard
            .slots
            .iter()
            .cloned()
            .collect::<Option<Vec<Payload>>>()
            .ok_or_else(|| {
                KMeansError::Desynchronized("round completed with an empty slot".to_string())
            })?;

        guard.departed += 1;
        if guard.departed == self.world {
            guard.slots.iter_mut().for_each(|slot| *slot = None);
            guard.arrived = 0;
            guard.departed = 0;
            guard.draining = false;
            guard.generation = guard.generation.wrapping_add(1);
            self.shared.cv.notify_all();
        }

        Ok(gathered)
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world
    }

    fn all_gather<T: Clone + Send + Sync + 'static>(&self, value: T) -> Result<Vec<T>, KMeansError> {
        let start = Instant::now();
        let gathered = self.exchange(Arc::new(value));
        self.comm_nanos
            .fetch_add(start.elapsed().as_nanos() as u64, Ordering::Relaxed);

        gathered?
            .iter()
            .enumerate()
            .map(|(rank, payload)| {
                payload.downcast_ref::<T>().cloned().ok_or_else(|| {
                    KMeansError::Desynchronized(format!(
                        "rank {} entered a different collective than rank {}",
                        rank, self.rank
                    ))
                })
            })
            .collect()
    }

    fn abort(&self, reason: &str) {
        let mut guard = self.lock();
        if guard.aborted.is_none() {
            tracing::warn!(rank = self.rank, reason, "aborting worker group");
            guard.aborted = Some((self.rank, reason.to_string()));
        }
        self.shared.cv.notify_all();
    }

    fn comm_time(&self) -> Duration {
        Duration::from_nanos(self.comm_nanos.load(Ordering::Relaxed))
    }
}

/// Aborts the worker group if the owning thread unwinds, so peers blocked in a
/// collective fail instead of waiting forever.
pub struct AbortOnPanic<'a, C: Communicator>(pub &'a C);

impl<C: Communicator> Drop for AbortOnPanic<'_, C> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort("worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;
    use ndarray::array;
    use std::thread;

    #[derive(Clone, Debug, PartialEq)]
    struct Sum(f64);

    impl Reduce for Sum {
        fn combine(&mut self, other: &Self) {
            self.0 += other.0;
        }
    }

    fn run_group<T, F>(world: usize, body: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&LocalCommunicator) -> T + Sync,
    {
        let comms = LocalCommunicator::new_group(world);
        thread::scope(|scope| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    let body = &body;
                    scope.spawn(move || body(comm))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_all_gather_rank_order() {
        let results = run_group(4, |comm| comm.all_gather(comm.rank() * 10).unwrap());
        for gathered in results {
            assert_eq!(gathered, vec![0, 10, 20, 30]);
        }
    }

    #[test]
    fn test_all_reduce_identical_everywhere() {
        let results = run_group(5, |comm| {
            let mut out = Vec::new();
            for round in 0..200 {
                let value = Sum(0.1 * (comm.rank() + 1) as f64 + round as f64 * 1e-3);
                out.push(comm.all_reduce(value).unwrap().0.to_bits());
            }
            out
        });
        for other in &results[1..] {
            assert_eq!(other, &results[0]);
        }
    }

    #[test]
    fn test_rounds_do_not_interleave() {
        let results = run_group(3, |comm| {
            (0..500)
                .map(|round| {
                    let gathered = comm.all_gather((round, comm.rank())).unwrap();
                    gathered.iter().all(|&(r, _)| r == round)
                })
                .all(|ok| ok)
        });
        assert!(results.into_iter().all(|ok| ok));
    }

    #[test]
    fn test_broadcast_from_root() {
        let results = run_group(3, |comm| {
            let value = if comm.rank() == 0 {
                Some(array![1.0, 2.0, 3.0])
            } else {
                None
            };
            comm.broadcast(0, value).unwrap()
        });
        for centroids in results {
            assert_eq!(centroids, array![1.0, 2.0, 3.0]);
        }
    }

    #[test]
    fn test_broadcast_without_root_value_fails_everywhere() {
        let results = run_group(2, |comm| comm.broadcast::<u32>(1, None).is_err());
        assert_eq!(results, vec![true, true]);
    }

    #[test]
    fn test_scatter_contiguous_chunks() {
        let data = Arc::new(array![1.0, 1.1, 5.0, 5.2, 9.0]);
        let chunks = partition(data.len(), 2).unwrap();
        let results = run_group(2, |comm| {
            let root_data = (comm.rank() == 0).then(|| data.clone());
            comm.scatter(0, root_data, &chunks).unwrap()
        });
        assert_eq!(results[0], array![1.0, 1.1, 5.0]);
        assert_eq!(results[1], array![5.2, 9.0]);
    }

    #[test]
    fn test_mismatched_collectives_detected() {
        let results = run_group(2, |comm| {
            if comm.rank() == 0 {
                comm.all_gather(1u32).map(|_| ())
            } else {
                comm.all_gather(1.0f64).map(|_| ())
            }
        });
        for result in results {
            assert!(matches!(result, Err(KMeansError::Desynchronized(_))));
        }
    }

    #[test]
    fn test_abort_releases_blocked_peers() {
        let results = run_group(3, |comm| {
            if comm.rank() == 2 {
                comm.abort("bad input");
                Err(KMeansError::InvalidInput("bad input".to_string()))
            } else {
                comm.barrier()
            }
        });
        for result in results {
            match result {
                Err(KMeansError::WorkerFailed { rank, .. }) => assert_eq!(rank, 2),
                Err(KMeansError::InvalidInput(_)) => {}
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    #[test]
    fn test_abort_on_panic_guard() {
        let comms = LocalCommunicator::new_group(2);
        let results: Vec<bool> = thread::scope(|scope| {
            let panicking = scope.spawn(|| {
                let _guard = AbortOnPanic(&comms[0]);
                panic!("worker 0 crashed");
            });
            let waiting = scope.spawn(|| comms[1].barrier().is_err());
            vec![panicking.join().is_err(), waiting.join().unwrap()]
        });
        assert_eq!(results, vec![true, true]);
    }

    #[test]
    fn test_single_worker_group() {
        let results = run_group(1, |comm| comm.all_reduce(Sum(2.5)).unwrap());
        assert_eq!(results, vec![Sum(2.5)]);
    }
}
