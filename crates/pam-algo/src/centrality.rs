//! Directed betweenness centrality (Brandes).
//!
//! Scores are normalized by `1 / ((n - 1)(n - 2))` for `n > 2`. When only a
//! sample of `k` sources is used, scores are additionally scaled by `n / k`
//! so they estimate the exact values.
//!
//! Sources are processed in fixed-size chunks with rayon; chunk partial sums
//! are added in chunk order, so results do not depend on the thread count.
//! Call inside a `ThreadPool::install` to bound the parallelism.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::deadline::{Deadline, StageError};

const MIN_CHUNK: usize = 16;
const TARGET_CHUNKS: usize = 64;

/// Which sources the shortest-path sweeps start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelection {
    All,
    /// `size` distinct sources drawn with a seeded RNG.
    Sample { size: usize, seed: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Betweenness {
    /// Score per node position.
    pub scores: Vec<f64>,
    /// True when computed from a strict subset of sources.
    pub approximate: bool,
}

/// Betweenness over an out-adjacency list indexed by node position.
pub fn betweenness(
    out_adj: &[Vec<usize>],
    selection: SourceSelection,
    deadline: &Deadline,
) -> Result<Betweenness, StageError> {
    let n = out_adj.len();
    let (sources, approximate) = select_sources(n, selection);

    let chunk = (sources.len() / TARGET_CHUNKS).max(MIN_CHUNK);
    let partials: Vec<Result<Vec<f64>, StageError>> = sources
        .par_chunks(chunk)
        .map(|chunk_sources| {
            let mut sweep = Sweep::new(n);
            let mut acc = vec![0.0; n];
            for &source in chunk_sources {
                deadline.check()?;
                sweep.accumulate(out_adj, source, &mut acc);
            }
            Ok(acc)
        })
        .collect();

    let mut scores = vec![0.0; n];
    for partial in partials {
        for (total, value) in scores.iter_mut().zip(partial?) {
            *total += value;
        }
    }

    if n > 2 {
        let mut scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        if approximate && !sources.is_empty() {
            scale *= n as f64 / sources.len() as f64;
        }
        for score in &mut scores {
            *score *= scale;
        }
    }

    if scores.iter().any(|s| !s.is_finite()) {
        return Err(StageError::NonFinite("betweenness"));
    }
    Ok(Betweenness {
        scores,
        approximate,
    })
}

fn select_sources(n: usize, selection: SourceSelection) -> (Vec<usize>, bool) {
    match selection {
        SourceSelection::Sample { size, seed } if size < n => {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut sample = index::sample(&mut rng, n, size).into_vec();
            sample.sort_unstable();
            (sample, true)
        }
        _ => ((0..n).collect(), false),
    }
}

/// Scratch buffers for single-source sweeps, reused across sources.
struct Sweep {
    stack: Vec<usize>,
    preds: Vec<Vec<usize>>,
    sigma: Vec<f64>,
    dist: Vec<i64>,
    delta: Vec<f64>,
    queue: VecDeque<usize>,
}

impl Sweep {
    fn new(n: usize) -> Self {
        Self {
            stack: Vec::with_capacity(n),
            preds: vec![Vec::new(); n],
            sigma: vec![0.0; n],
            dist: vec![-1; n],
            delta: vec![0.0; n],
            queue: VecDeque::new(),
        }
    }

    fn reset(&mut self) {
        for &v in &self.stack {
            self.preds[v].clear();
            self.sigma[v] = 0.0;
            self.dist[v] = -1;
            self.delta[v] = 0.0;
        }
        self.stack.clear();
        self.queue.clear();
    }

    /// BFS from `source`, then add dependencies into `acc`.
    fn accumulate(&mut self, out_adj: &[Vec<usize>], source: usize, acc: &mut [f64]) {
        self.reset();
        self.sigma[source] = 1.0;
        self.dist[source] = 0;
        self.queue.push_back(source);

        while let Some(v) = self.queue.pop_front() {
            self.stack.push(v);
            let next = self.dist[v] + 1;
            for &w in &out_adj[v] {
                if self.dist[w] < 0 {
                    self.dist[w] = next;
                    self.queue.push_back(w);
                }
                if self.dist[w] == next {
                    self.sigma[w] += self.sigma[v];
                    self.preds[w].push(v);
                }
            }
        }

        for i in (0..self.stack.len()).rev() {
            let w = self.stack[i];
            let coeff = (1.0 + self.delta[w]) / self.sigma[w];
            for j in 0..self.preds[w].len() {
                let v = self.preds[w][j];
                self.delta[v] += self.sigma[v] * coeff;
            }
            if w != source {
                acc[w] += self.delta[w];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(out_adj: &[Vec<usize>]) -> Vec<f64> {
        betweenness(out_adj, SourceSelection::All, &Deadline::unbounded())
            .unwrap()
            .scores
    }

    #[test]
    fn directed_path_middle_node() {
        // 0 -> 1 -> 2: only node 1 sits on a shortest path, normalized by 1/(2*1)
        let scores = exact(&[vec![1], vec![2], vec![]]);
        assert_eq!(scores, vec![0.0, 0.5, 0.0]);
    }

    #[test]
    fn star_hub_takes_everything() {
        // hub 0 with bidirectional spokes to 1..=4
        let mut adj = vec![vec![1, 2, 3, 4]];
        for _ in 1..=4 {
            adj.push(vec![0]);
        }
        let scores = exact(&adj);
        assert!((scores[0] - 1.0).abs() < 1e-12);
        assert!(scores[1..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn split_paths_share_credit() {
        // 0 -> {1, 2} -> 3
        let scores = exact(&[vec![1, 2], vec![3], vec![3], vec![]]);
        assert!((scores[1] - 0.5 / 6.0).abs() < 1e-12);
        assert!((scores[2] - 0.5 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn tiny_graphs_are_zero() {
        assert!(exact(&[]).is_empty());
        assert_eq!(exact(&[vec![1], vec![0]]), vec![0.0, 0.0]);
    }

    #[test]
    fn sampling_is_seeded_and_flagged() {
        let n = 200;
        let adj: Vec<Vec<usize>> = (0..n).map(|i| vec![(i + 1) % n]).collect();
        let selection = SourceSelection::Sample { size: 50, seed: 42 };
        let a = betweenness(&adj, selection, &Deadline::unbounded()).unwrap();
        let b = betweenness(&adj, selection, &Deadline::unbounded()).unwrap();
        assert!(a.approximate);
        assert_eq!(a, b);
        assert!(a.scores.iter().all(|s| s.is_finite() && *s >= 0.0));
    }

    #[test]
    fn oversized_sample_is_exact() {
        let adj = vec![vec![1], vec![2], vec![]];
        let result = betweenness(
            &adj,
            SourceSelection::Sample { size: 10, seed: 1 },
            &Deadline::unbounded(),
        )
        .unwrap();
        assert!(!result.approximate);
        assert_eq!(result.scores, vec![0.0, 0.5, 0.0]);
    }

    #[test]
    fn result_independent_of_pool_size() {
        let n = 300;
        let adj: Vec<Vec<usize>> = (0..n).map(|i| vec![(i + 1) % n, (i * 7 + 3) % n]).collect();
        let run = |threads| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| exact(&adj))
        };
        assert_eq!(run(1), run(4));
    }

    #[test]
    fn expired_deadline_aborts() {
        let adj = vec![vec![1], vec![2], vec![]];
        let err = betweenness(
            &adj,
            SourceSelection::All,
            &Deadline::after(std::time::Duration::ZERO),
        )
        .unwrap_err();
        assert_eq!(err, StageError::BudgetExhausted);
    }
}
