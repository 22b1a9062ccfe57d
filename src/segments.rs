//! Groups clients into viewer segments by how they watch.
//!
//! Every client with viewing records becomes a profile of viewing hours,
//! distinct channels and the share of each leading category in their viewing
//! time. Profiles are scaled to 0..1 per feature and grouped with k-means.
//! Seeding is farthest-point from the first client, so the same data always
//! gives the same segments.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, instrument};

use crate::records::{Dataset, DatasetKind, Value};
use crate::stats::totals_by;

pub const SEGMENT_COUNT: usize = 3;
const SHARE_CATEGORIES: usize = 4;
const MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub clients: usize,
    pub mean_hours: f64,
    pub mean_channels: f64,
    /// Mean share in percent, one per entry of [`SegmentReport::categories`].
    pub shares: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentReport {
    pub categories: Vec<String>,
    /// Most hours first.
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
struct Profile {
    hours: f64,
    channels: f64,
    shares: Vec<f64>,
}

impl Profile {
    fn features(&self) -> Vec<f64> {
        let mut f = vec![self.hours, self.channels];
        f.extend(&self.shares);
        f
    }
}

#[derive(Default)]
struct Viewing {
    minutes: u64,
    channels: HashSet<i64>,
    per_category: Vec<u64>,
}

/// Splits the clients of a viewing statistics table into at most `k`
/// segments. Other tables give an empty report.
#[instrument(skip(ds), fields(records = ds.len()))]
pub fn segment_viewers(ds: &Dataset, k: usize) -> SegmentReport {
    if ds.kind != DatasetKind::ViewingStats {
        return SegmentReport::default();
    }
    let empty = Value::Empty.to_string();
    let categories: Vec<String> = totals_by(ds, "category", "duration")
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| *name != empty)
        .take(SHARE_CATEGORIES)
        .collect();

    let profiles = profiles(ds, &categories);
    let points = scaled(&profiles);
    let assignment = kmeans(&points, k);

    let clusters = assignment.iter().copied().max().map_or(0, |m| m + 1);
    let mut segments: Vec<Segment> = (0..clusters)
        .filter_map(|c| {
            let members: Vec<&Profile> = profiles
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == c)
                .map(|(p, _)| p)
                .collect();
            summarize(&members, categories.len())
        })
        .collect();
    segments.sort_by(|a, b| b.mean_hours.total_cmp(&a.mean_hours));
    debug!("{} clients in {} segments", profiles.len(), segments.len());

    SegmentReport {
        categories,
        segments,
    }
}

fn profiles(ds: &Dataset, categories: &[String]) -> Vec<Profile> {
    let column = |id| ds.kind.column_index(id);
    let (Some(client), Some(channel), Some(duration), Some(category)) = (
        column("client_id"),
        column("ch_id"),
        column("duration"),
        column("category"),
    ) else {
        return Vec::new();
    };

    // Ordered by client id so seeding does not depend on the record order.
    let mut per_client: BTreeMap<String, Viewing> = BTreeMap::new();
    for r in &ds.records {
        let Value::Text(id) = r.get(client) else {
            continue;
        };
        let v = per_client.entry(id.clone()).or_insert_with(|| Viewing {
            per_category: vec![0; categories.len()],
            ..Default::default()
        });
        let minutes = match r.get(duration) {
            Value::Int(d) if *d > 0 => *d as u64,
            _ => 0,
        };
        v.minutes += minutes;
        if let Value::Int(ch) = r.get(channel) {
            v.channels.insert(*ch);
        }
        let name = r.get(category).to_string();
        if let Some(pos) = categories.iter().position(|c| *c == name) {
            v.per_category[pos] += minutes;
        }
    }

    per_client
        .into_values()
        .map(|v| Profile {
            hours: v.minutes as f64 / 60.0,
            channels: v.channels.len() as f64,
            shares: v
                .per_category
                .iter()
                .map(|&m| {
                    if v.minutes == 0 {
                        0.0
                    } else {
                        m as f64 * 100.0 / v.minutes as f64
                    }
                })
                .collect(),
        })
        .collect()
}

/// Min-max scales every feature to 0..1. Constant features become 0.
fn scaled(profiles: &[Profile]) -> Vec<Vec<f64>> {
    let points: Vec<Vec<f64>> = profiles.iter().map(Profile::features).collect();
    let Some(dims) = points.first().map(Vec::len) else {
        return points;
    };
    let bounds: Vec<(f64, f64)> = (0..dims)
        .map(|d| {
            points.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| {
                (lo.min(p[d]), hi.max(p[d]))
            })
        })
        .collect();
    points
        .into_iter()
        .map(|p| {
            p.iter()
                .zip(&bounds)
                .map(|(&x, &(lo, hi))| if hi > lo { (x - lo) / (hi - lo) } else { 0.0 })
                .collect()
        })
        .collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance(point, a).total_cmp(&distance(point, b)))
        .map_or(0, |(i, _)| i)
}

/// Cluster index per point. Fewer than `k` clusters come out when there are
/// fewer distinct points.
fn kmeans(points: &[Vec<f64>], k: usize) -> Vec<usize> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let mut centroids = vec![first.clone()];
    while centroids.len() < k {
        let farthest = points
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| distance(p, c))
                    .fold(f64::MAX, f64::min)
            })
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.total_cmp(b).then(ib.cmp(ia)));
        match farthest {
            Some((idx, d)) if d > 0.0 => centroids.push(points[idx].clone()),
            _ => break,
        }
    }

    let mut assignment: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
    for iteration in 0..MAX_ITERATIONS {
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = points
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == c)
                .map(|(p, _)| p)
                .collect();
            // An empty cluster keeps its centroid.
            if members.is_empty() {
                continue;
            }
            for (d, value) in centroid.iter_mut().enumerate() {
                *value = members.iter().map(|m| m[d]).sum::<f64>() / members.len() as f64;
            }
        }
        let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
        if next == assignment {
            debug!("k-means settled after {} iterations", iteration + 1);
            break;
        }
        assignment = next;
    }
    assignment
}

fn summarize(members: &[&Profile], categories: usize) -> Option<Segment> {
    if members.is_empty() {
        return None;
    }
    let n = members.len() as f64;
    Some(Segment {
        clients: members.len(),
        mean_hours: members.iter().map(|p| p.hours).sum::<f64>() / n,
        mean_channels: members.iter().map(|p| p.channels).sum::<f64>() / n,
        shares: (0..categories)
            .map(|c| members.iter().map(|p| p.shares[c]).sum::<f64>() / n)
            .collect(),
    })
}
