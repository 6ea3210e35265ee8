//! Summary statistics and chart buckets over a user's measurements.
//!
//! Every aggregate parses `dimensions` on its own. A record whose string does
//! not parse is left out of the aggregates that need the numbers and still
//! counts everywhere else.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use dimscope_types::{
    DistributionBucket, Measurement, MeasurementStats, SizeCategory, SizeCategoryCounts,
};

use super::dimension::parse_dimensions;

/// Records newer than this many days count as recent
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Width of each distribution bucket, in dimension units
pub const BUCKET_WIDTH: f64 = 20.0;

/// Shown when no record has a usable size
pub const NOT_AVAILABLE: &str = "N/A";

/// Compute the dashboard counters
pub fn summarize(records: &[Measurement], now: DateTime<Utc>, unit: &str) -> MeasurementStats {
    MeasurementStats {
        total_measurements: records.len(),
        recent_measurements: count_recent(records, now),
        saved_images: count_saved_images(records),
        avg_size: format_avg_size(average_height(records), unit),
    }
}

/// Records created at or after `now - 7 days`
pub fn count_recent(records: &[Measurement], now: DateTime<Utc>) -> usize {
    let cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
    records.iter().filter(|r| r.created_at >= cutoff).count()
}

pub fn count_saved_images(records: &[Measurement]) -> usize {
    records.iter().filter(|r| r.has_image()).count()
}

/// Mean of the second dimension component over parseable records
pub fn average_height(records: &[Measurement]) -> Option<f64> {
    let (sum, count) = records
        .iter()
        .filter_map(|r| parse_dimensions(&r.dimensions))
        .fold((0.0, 0usize), |(sum, count), dims| (sum + dims.height(), count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

pub fn format_avg_size(avg: Option<f64>, unit: &str) -> String {
    match avg {
        Some(value) if unit.is_empty() => format!("{:.1}", value),
        Some(value) => format!("{:.1} {}", value, unit),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Histogram of the first dimension component in 20-unit buckets, ascending
pub fn width_distribution(records: &[Measurement]) -> Vec<DistributionBucket> {
    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();

    for dims in records.iter().filter_map(|r| parse_dimensions(&r.dimensions)) {
        // `as` saturates, so huge widths land in the outermost bucket
        let start = ((dims.width() / BUCKET_WIDTH).floor() * BUCKET_WIDTH) as i64;
        *buckets.entry(start).or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .map(|(start, count)| {
            let end = start.saturating_add(BUCKET_WIDTH as i64);
            DistributionBucket {
                range_start: start,
                range_end: end,
                label: format!("{}-{}", start, end),
                count,
            }
        })
        .collect()
}

/// Size class of a single dimension string
pub fn categorize(dimensions: &str) -> SizeCategory {
    parse_dimensions(dimensions)
        .map(|dims| SizeCategory::from_height(dims.height()))
        .unwrap_or(SizeCategory::Unknown)
}

pub fn size_categories(records: &[Measurement]) -> SizeCategoryCounts {
    let mut counts = SizeCategoryCounts::default();
    for record in records {
        counts.add(categorize(&record.dimensions));
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimscope_types::MeasurementMethod;

    fn record(id: u64, dimensions: &str, created_at: DateTime<Utc>) -> Measurement {
        Measurement {
            id,
            owner_id: "owner".to_string(),
            object_name: "object".to_string(),
            dimensions: dimensions.to_string(),
            method: MeasurementMethod::Upload,
            image_url: None,
            confidence: None,
            created_at,
            data: None,
        }
    }

    #[test]
    fn test_width_distribution_huge_widths_saturate() {
        let now = Utc::now();
        let records = vec![
            record(1, "100000000000000000000000 × 5", now),
            record(2, "-100000000000000000000000 × 5", now),
            record(3, "12 × 5", now),
        ];
        let buckets = width_distribution(&records);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].range_start, i64::MIN);
        assert_eq!(buckets[1].label, "0-20");
        assert_eq!(buckets[2].range_start, i64::MAX);
        assert_eq!(buckets[2].range_end, i64::MAX);
        assert!(buckets.iter().all(|b| b.count == 1));
    }

    #[test]
    fn test_average_ignores_malformed() {
        let now = Utc::now();
        let records = vec![
            record(1, "10 × 20", now),
            record(2, "30 × 40", now),
            record(3, "garbage", now),
        ];
        assert_eq!(average_height(&records), Some(30.0));

        let stats = summarize(&records, now, "cm");
        assert_eq!(stats.total_measurements, 3);
        assert_eq!(stats.avg_size, "30.0 cm");
    }

    #[test]
    fn test_average_not_available_without_parseable_records() {
        let now = Utc::now();
        let records = vec![record(1, "n/a", now), record(2, "5", now)];
        assert_eq!(average_height(&records), None);
        assert_eq!(summarize(&records, now, "cm").avg_size, NOT_AVAILABLE);
        assert_eq!(summarize(&[], now, "cm").avg_size, NOT_AVAILABLE);
    }

    #[test]
    fn test_recent_boundary_is_inclusive() {
        let now = Utc::now();
        let records = vec![
            record(1, "1 × 1", now),
            record(2, "1 × 1", now - Duration::days(7)),
            record(3, "1 × 1", now - Duration::days(7) - Duration::seconds(1)),
            record(4, "1 × 1", now - Duration::days(30)),
        ];
        assert_eq!(count_recent(&records, now), 2);
    }

    #[test]
    fn test_saved_images_requires_non_empty_url() {
        let now = Utc::now();
        let mut with_image = record(1, "1 × 1", now);
        with_image.image_url = Some("data:image/png;base64,AAAA".to_string());
        let mut empty = record(2, "1 × 1", now);
        empty.image_url = Some(String::new());
        let none = record(3, "1 × 1", now);

        assert_eq!(count_saved_images(&[with_image, empty, none]), 1);
    }

    #[test]
    fn test_width_distribution_sorted_buckets() {
        let now = Utc::now();
        let records = vec![
            record(1, "45 × 1", now),
            record(2, "0 × 1", now),
            record(3, "19.9 × 1", now),
            record(4, "20 × 1", now),
            record(5, "oops", now),
            record(6, "41 × 2", now),
        ];
        let buckets = width_distribution(&records);
        let summary: Vec<(i64, usize)> = buckets.iter().map(|b| (b.range_start, b.count)).collect();
        assert_eq!(summary, vec![(0, 2), (20, 1), (40, 2)]);
        assert_eq!(buckets[0].label, "0-20");
        assert_eq!(buckets[2].range_end, 60);
    }

    #[test]
    fn test_size_categories() {
        let now = Utc::now();
        let records = vec![
            record(1, "1 × 5", now),
            record(2, "1 × 15", now),
            record(3, "1 × 35", now),
        ];
        let counts = size_categories(&records);
        assert_eq!(counts.small, 1);
        assert_eq!(counts.medium, 1);
        assert_eq!(counts.large, 1);
        assert_eq!(counts.unknown, 0);
    }

    #[test]
    fn test_size_category_boundaries_and_unknown() {
        assert_eq!(categorize("1 × 10"), SizeCategory::Medium);
        assert_eq!(categorize("1 × 30"), SizeCategory::Medium);
        assert_eq!(categorize("1 × 30.01"), SizeCategory::Large);
        assert_eq!(categorize("1 × 9.99"), SizeCategory::Small);
        assert_eq!(categorize("bad"), SizeCategory::Unknown);
    }

    #[test]
    fn test_malformed_record_still_counts_in_totals() {
        let now = Utc::now();
        let mut broken = record(1, "???", now);
        broken.image_url = Some("img".to_string());
        let stats = summarize(&[broken], now, "cm");
        assert_eq!(stats.total_measurements, 1);
        assert_eq!(stats.recent_measurements, 1);
        assert_eq!(stats.saved_images, 1);
        assert_eq!(stats.avg_size, NOT_AVAILABLE);
    }
}
