//! Output formatting module

use dimscope_app::Review;
use dimscope_domain::service::{format_dimensions, label_anchor, parse_dimensions, ScreenRect};
use dimscope_types::{Distribution, Measurement, MeasurementStats, OutputFormat, Result};
use serde_json::json;

/// Height reserved for a label drawn above each overlay box
pub const LABEL_HEIGHT: f64 = 20.0;

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

fn overlay_json(rects: &[ScreenRect]) -> serde_json::Value {
    rects
        .iter()
        .map(|r| {
            let (label_x, label_y) = label_anchor(r, LABEL_HEIGHT);
            json!({
                "x": r.x, "y": r.y, "width": r.width, "height": r.height,
                "labelX": label_x, "labelY": label_y,
            })
        })
        .collect()
}

pub fn output_review(
    output_format: OutputFormat,
    review: &Review,
    overlay: Option<&[ScreenRect]>,
) -> Result<()> {
    if output_format == OutputFormat::Json {
        let mut value = json!({
            "message": review.message,
            "method": review.method,
            "measurements": review.results,
            "hasAnnotatedImage": review.annotated_image.is_some(),
        });
        if let Some(rects) = overlay {
            value["overlay"] = overlay_json(rects);
        }
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("\nDetection Result");
    println!("================");
    println!("{}", review.message);
    println!();
    println!(
        "{:>3} {:<24} {:<20} {:>6}  {}",
        "#", "Object", "Dimensions", "Conf.", "Box (x1,y1)-(x2,y2)"
    );
    println!("{}", "-".repeat(80));

    for (i, result) in review.results.iter().enumerate() {
        let b = &result.bounding_box;
        println!(
            "{:>3} {:<24} {:<20} {:>5}%  ({:.0},{:.0})-({:.0},{:.0})",
            i,
            truncate(&result.object_name, 24),
            truncate(&result.dimensions, 20),
            result.confidence_percent(),
            b.x1,
            b.y1,
            b.x2,
            b.y2
        );
    }

    if let Some(rects) = overlay {
        println!("\nOverlay (screen px)");
        println!("{:>3} {:>8} {:>8} {:>8} {:>8}   {}", "#", "x", "y", "width", "height", "label at");
        for (i, r) in rects.iter().enumerate() {
            let (lx, ly) = label_anchor(r, LABEL_HEIGHT);
            println!(
                "{:>3} {:>8.1} {:>8.1} {:>8.1} {:>8.1}   ({:.1}, {:.1})",
                i, r.x, r.y, r.width, r.height, lx, ly
            );
        }
    }

    Ok(())
}

pub fn output_record(output_format: OutputFormat, record: &Measurement) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!("\nMeasurement #{}", record.id);
    println!("===============");
    println!("Object:      {}", record.object_name);
    println!("Dimensions:  {}", record.dimensions);
    match parse_dimensions(&record.dimensions) {
        Some(dims) => println!("Parsed:      {}", format_dimensions(dims.components(), "")),
        None => println!("Parsed:      (not parseable)"),
    }
    println!("Method:      {}", record.method);
    println!(
        "Confidence:  {}",
        record
            .confidence
            .map(|c| format!("{}%", c))
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Image:       {}", if record.has_image() { "saved" } else { "none" });
    println!("Created:     {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));

    if let Some(candidates) = record.detections() {
        if candidates.len() > 1 {
            println!("\nOther candidates from the same capture:");
            for c in candidates.iter().filter(|c| c.object_name != record.object_name) {
                println!("  - {} ({}, {}%)", c.object_name, c.dimensions, c.confidence_percent());
            }
        }
    }

    Ok(())
}

pub fn output_history(
    output_format: OutputFormat,
    owner_id: &str,
    records: &[Measurement],
    limit: usize,
) -> Result<()> {
    if output_format == OutputFormat::Json {
        let shown: Vec<&Measurement> = records.iter().take(limit).collect();
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    println!("Measurement History ({})", owner_id);
    println!("===================");
    println!("Total entries: {}", records.len());
    println!();

    if records.is_empty() {
        println!("No entries found.");
        return Ok(());
    }

    println!(
        "{:>6} {:<28} {:<20} {:<7} {:>5} {:>12}",
        "ID", "Object", "Dimensions", "Method", "Conf.", "Date"
    );
    println!("{}", "-".repeat(82));

    for record in records.iter().take(limit) {
        let confidence = record
            .confidence
            .map(|c| format!("{}%", c))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:>6} {:<28} {:<20} {:<7} {:>5} {:>12}",
            record.id,
            truncate(&record.object_name, 28),
            truncate(&record.dimensions, 20),
            record.method.label(),
            confidence,
            record.created_at.format("%m/%d %H:%M").to_string()
        );
    }

    if records.len() > limit {
        println!();
        println!("... and {} more entries", records.len() - limit);
    }

    Ok(())
}

pub fn output_stats(
    output_format: OutputFormat,
    stats: &MeasurementStats,
    distribution: Option<&Distribution>,
) -> Result<()> {
    if output_format == OutputFormat::Json {
        let value = match distribution {
            Some(d) => json!({ "stats": stats, "distribution": d }),
            None => serde_json::to_value(stats)?,
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Measurement Statistics");
    println!("======================");
    println!("Total:         {}", stats.total_measurements);
    println!("Last 7 days:   {}", stats.recent_measurements);
    println!("With image:    {}", stats.saved_images);
    println!("Average size:  {}", stats.avg_size);

    if let Some(d) = distribution {
        println!("\nWidth distribution");
        if d.width_buckets.is_empty() {
            println!("  (no parseable dimensions)");
        }
        for bucket in &d.width_buckets {
            println!("  {:>10}  {:>4}  {}", bucket.label, bucket.count, "#".repeat(bucket.count.min(50)));
        }

        let c = &d.size_categories;
        println!("\nSize categories");
        println!("  Small:   {}", c.small);
        println!("  Medium:  {}", c.medium);
        println!("  Large:   {}", c.large);
        println!("  Unknown: {}", c.unknown);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long object name", 10), "a very ...");
        assert_eq!(truncate("ボトルとカップと皿", 5), "ボト...");
    }

    #[test]
    fn test_overlay_json_labels_clamped() {
        let rects = [ScreenRect {
            x: 40.0,
            y: 10.0,
            width: 40.0,
            height: 40.0,
        }];
        let value = overlay_json(&rects);
        assert_eq!(value[0]["labelX"], 40.0);
        assert_eq!(value[0]["labelY"], 0.0);
    }
}
