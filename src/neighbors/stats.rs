use super::types::{NeighborRecord, NeighborStats, PartitionStats};

/// Summarize neighbors into "all" and "close" (distance <= `max_distance`) partitions.
///
/// Neighbors whose label cannot be parsed are skipped entirely; they do not count as
/// non-fraud. Neighbors without a usable distance never count as close.
pub fn summarize(neighbors: &[NeighborRecord], max_distance: f64) -> NeighborStats {
    let all_neighbors = partition(neighbors.iter());
    let close_neighbors = partition(
        neighbors
            .iter()
            .filter(|n| is_close(n.distance, max_distance)),
    );

    let ui_rate = close_neighbors.rate.or(all_neighbors.rate);

    NeighborStats {
        max_distance_used: max_distance,
        all_neighbors,
        close_neighbors,
        ui_rate,
        close_rate: close_neighbors.rate,
        close_count: close_neighbors.count,
    }
}

fn is_close(distance: Option<f64>, max_distance: f64) -> bool {
    distance
        .filter(|d| d.is_finite())
        .map(|d| d <= max_distance)
        .unwrap_or(false)
}

fn partition<'a>(rows: impl Iterator<Item = &'a NeighborRecord>) -> PartitionStats {
    let mut count = 0usize;
    let mut fraud = 0usize;

    for label in rows.filter_map(NeighborRecord::parsed_label) {
        count += 1;
        if label == 1 {
            fraud += 1;
        }
    }

    let rate = (count > 0).then(|| fraud as f64 / count as f64);
    PartitionStats { count, fraud, rate }
}
