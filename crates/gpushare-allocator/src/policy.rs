//! Topology-aware allocation policies

use gpushare_core::GpuDevice;
use std::collections::HashSet;
use tracing::debug;

/// Policy choosing a set of GPUs based on how they are interconnected
pub trait AllocationPolicy: Send + Sync {
    /// Pick `size` devices from `available`, always including `required`.
    ///
    /// Returns an empty list when the request cannot be satisfied.
    fn allocate(
        &self,
        available: &[GpuDevice],
        required: &[GpuDevice],
        size: usize,
    ) -> Vec<GpuDevice>;
}

/// Best-effort policy: maximize the summed pairwise link score of the set
pub struct BestEffortPolicy;

impl AllocationPolicy for BestEffortPolicy {
    fn allocate(
        &self,
        available: &[GpuDevice],
        required: &[GpuDevice],
        size: usize,
    ) -> Vec<GpuDevice> {
        if size > available.len() || required.len() > size {
            return Vec::new();
        }

        let available_uuids: HashSet<&str> = available.iter().map(|d| d.uuid.as_str()).collect();
        if required
            .iter()
            .any(|d| !available_uuids.contains(d.uuid.as_str()))
        {
            return Vec::new();
        }

        if required.len() == size {
            return required.to_vec();
        }

        let required_uuids: HashSet<&str> = required.iter().map(|d| d.uuid.as_str()).collect();
        let pool: Vec<&GpuDevice> = available
            .iter()
            .filter(|d| !required_uuids.contains(d.uuid.as_str()))
            .collect();
        let needed = size - required.len();

        let mut best: Option<(u32, Vec<usize>)> = None;
        for_each_combination(pool.len(), needed, |combo| {
            let set: Vec<&GpuDevice> = required
                .iter()
                .chain(combo.iter().map(|&i| pool[i]))
                .collect();
            let score = set_score(&set);
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, combo.to_vec()));
            }
        });

        let Some((score, combo)) = best else {
            return Vec::new();
        };

        let mut chosen: Vec<GpuDevice> = combo.into_iter().map(|i| pool[i].clone()).collect();
        chosen.sort_by_key(|d| d.index);

        debug!(
            score = score,
            gpus = ?chosen.iter().map(|d| d.index).collect::<Vec<_>>(),
            "Best-effort topology selection"
        );

        required.iter().cloned().chain(chosen).collect()
    }
}

/// Sum of link scores over every pair in the set
fn set_score(devices: &[&GpuDevice]) -> u32 {
    let mut score = 0;
    for (i, a) in devices.iter().enumerate() {
        for b in &devices[i + 1..] {
            score += a.pair_score(b);
        }
    }
    score
}

/// Call `f` with every k-element index combination of `0..n`, in lexicographic order
fn for_each_combination<F: FnMut(&[usize])>(n: usize, k: usize, mut f: F) {
    if k > n {
        return;
    }
    let mut combo: Vec<usize> = (0..k).collect();
    loop {
        f(&combo);

        // Find the rightmost position that can still advance
        let Some(pos) = (0..k).rev().find(|&i| combo[i] < n - k + i) else {
            return;
        };
        combo[pos] += 1;
        for i in pos + 1..k {
            combo[i] = combo[i - 1] + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpushare_core::{DeviceGraph, Link, LinkType};

    /// Four GPUs: 0-1 and 2-3 are NVLink pairs, everything else crosses sockets
    fn create_test_graph() -> DeviceGraph {
        let mut graph = DeviceGraph::new();
        for i in 0..4 {
            graph.add_device(GpuDevice::new(format!("GPU-{}", i), i));
        }
        let nvlink = Link {
            link_type: LinkType::NvLink,
            count: 1,
        };
        let cross = Link {
            link_type: LinkType::CrossCpu,
            count: 1,
        };
        graph.connect(0, 1, nvlink);
        graph.connect(2, 3, nvlink);
        for (a, b) in [(0, 2), (0, 3), (1, 2), (1, 3)] {
            graph.connect(a, b, cross);
        }
        graph
    }

    fn uuids(devices: &[GpuDevice]) -> Vec<&str> {
        devices.iter().map(|d| d.uuid.as_str()).collect()
    }

    #[test]
    fn test_combinations() {
        let mut seen = Vec::new();
        for_each_combination(4, 2, |c| seen.push(c.to_vec()));
        assert_eq!(
            seen,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );

        let mut count = 0;
        for_each_combination(3, 0, |c| {
            assert!(c.is_empty());
            count += 1;
        });
        assert_eq!(count, 1);
    }

    #[test]
    fn test_prefers_nvlink_pair() {
        let graph = create_test_graph();
        let available = graph.devices().to_vec();

        let result = BestEffortPolicy.allocate(&available, &[], 2);
        assert_eq!(uuids(&result), vec!["GPU-0", "GPU-1"]);
    }

    #[test]
    fn test_required_pulls_in_its_peer() {
        let graph = create_test_graph();
        let available = graph.devices().to_vec();
        let required = vec![graph.get("GPU-3").unwrap().clone()];

        let result = BestEffortPolicy.allocate(&available, &required, 2);
        assert_eq!(uuids(&result), vec!["GPU-3", "GPU-2"]);
    }

    #[test]
    fn test_all_available() {
        let graph = create_test_graph();
        let available = graph.devices().to_vec();

        let result = BestEffortPolicy.allocate(&available, &[], 4);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_unsatisfiable_requests() {
        let graph = create_test_graph();
        let available: Vec<GpuDevice> = graph.devices()[..2].to_vec();

        assert!(BestEffortPolicy.allocate(&available, &[], 3).is_empty());

        let outside = vec![graph.get("GPU-3").unwrap().clone()];
        assert!(BestEffortPolicy.allocate(&available, &outside, 1).is_empty());
        assert!(BestEffortPolicy.allocate(&available, &available, 1).is_empty());
    }
}
