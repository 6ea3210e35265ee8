//! Excel export of a user's measurement history

use std::path::Path;

use dimscope_domain::service::parse_dimensions;
use dimscope_types::{Distribution, Error, Measurement, MeasurementStats, Result, SizeCategory};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

fn excel_err(e: rust_xlsxwriter::XlsxError) -> Error {
    Error::Export(e.to_string())
}

/// Everything one report is built from
pub struct ExportReport<'a> {
    pub owner_id: &'a str,
    pub records: &'a [Measurement],
    pub stats: &'a MeasurementStats,
    pub distribution: &'a Distribution,
}

/// Export history to an Excel file with Summary and Details sheets
pub fn export_to_excel(report: &ExportReport<'_>, output_path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();

    let summary_sheet = workbook.add_worksheet();
    write_summary_sheet(summary_sheet, report)?;

    let details_sheet = workbook.add_worksheet();
    write_details_sheet(details_sheet, report.records)?;

    workbook.save(output_path).map_err(excel_err)?;

    Ok(())
}

fn write_summary_sheet(sheet: &mut Worksheet, report: &ExportReport<'_>) -> Result<()> {
    sheet.set_name("Summary").map_err(excel_err)?;

    let header_format = Format::new().set_bold();

    sheet
        .write_string_with_format(0, 0, "Measurement Report", &header_format)
        .map_err(excel_err)?;

    let rows: [(&str, String); 5] = [
        ("User:", report.owner_id.to_string()),
        ("Total Measurements:", report.stats.total_measurements.to_string()),
        ("Last 7 Days:", report.stats.recent_measurements.to_string()),
        ("With Image:", report.stats.saved_images.to_string()),
        ("Average Size:", report.stats.avg_size.clone()),
    ];
    for (i, (label, value)) in rows.iter().enumerate() {
        let row = 2 + i as u32;
        sheet.write_string(row, 0, *label).map_err(excel_err)?;
        sheet.write_string(row, 1, value).map_err(excel_err)?;
    }

    sheet
        .write_string_with_format(8, 0, "Width Distribution", &header_format)
        .map_err(excel_err)?;
    let mut row = 9;
    for bucket in &report.distribution.width_buckets {
        sheet.write_string(row, 0, &bucket.label).map_err(excel_err)?;
        sheet
            .write_number(row, 1, bucket.count as f64)
            .map_err(excel_err)?;
        row += 1;
    }

    row += 1;
    sheet
        .write_string_with_format(row, 0, "Size Categories", &header_format)
        .map_err(excel_err)?;
    row += 1;
    for category in [
        SizeCategory::Small,
        SizeCategory::Medium,
        SizeCategory::Large,
        SizeCategory::Unknown,
    ] {
        sheet.write_string(row, 0, category.label()).map_err(excel_err)?;
        sheet
            .write_number(row, 1, report.distribution.size_categories.get(category) as f64)
            .map_err(excel_err)?;
        row += 1;
    }

    sheet.set_column_width(0, 22).map_err(excel_err)?;
    sheet.set_column_width(1, 18).map_err(excel_err)?;

    Ok(())
}

fn write_details_sheet(sheet: &mut Worksheet, records: &[Measurement]) -> Result<()> {
    sheet.set_name("Details").map_err(excel_err)?;

    let header_format = Format::new().set_bold();

    let headers = [
        "ID",
        "Created",
        "Object",
        "Dimensions",
        "Width",
        "Height",
        "Method",
        "Confidence (%)",
        "Image",
    ];

    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *header, &header_format)
            .map_err(excel_err)?;
    }

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        let parsed = parse_dimensions(&record.dimensions);

        sheet.write_number(row, 0, record.id as f64).map_err(excel_err)?;
        sheet
            .write_string(row, 1, record.created_at.format("%Y-%m-%d %H:%M").to_string())
            .map_err(excel_err)?;
        sheet.write_string(row, 2, &record.object_name).map_err(excel_err)?;
        sheet.write_string(row, 3, &record.dimensions).map_err(excel_err)?;
        // unparseable dimensions leave width/height blank
        if let Some(dims) = parsed {
            sheet.write_number(row, 4, dims.width()).map_err(excel_err)?;
            sheet.write_number(row, 5, dims.height()).map_err(excel_err)?;
        }
        sheet.write_string(row, 6, record.method.label()).map_err(excel_err)?;
        if let Some(confidence) = record.confidence {
            sheet
                .write_number(row, 7, confidence as f64)
                .map_err(excel_err)?;
        }
        sheet
            .write_string(row, 8, if record.has_image() { "yes" } else { "no" })
            .map_err(excel_err)?;
    }

    sheet.set_column_width(1, 18).map_err(excel_err)?;
    sheet.set_column_width(2, 24).map_err(excel_err)?;
    sheet.set_column_width(3, 20).map_err(excel_err)?;

    Ok(())
}
