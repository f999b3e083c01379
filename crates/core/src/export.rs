//! Spreadsheet export of scan rows as a single-sheet `.xlsx` workbook.

use crate::domain::scan::{Column, ScanRow};
use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

pub const EXPORT_FILENAME: &str = "indian_stock_screener.xlsx";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SHEET_NAME: &str = "Screener";

/// Display columns: ticker, every requested scanner field, then the local indicators.
fn headers() -> Vec<&'static str> {
    let mut out = vec!["ticker"];
    out.extend(Column::REQUESTED.iter().map(|c| c.as_str()));
    out.extend(["RSI_14_local", "ATR_14_local"]);
    out
}

fn write_number(sheet: &mut Worksheet, row: u32, col: u16, v: Option<f64>) -> Result<(), XlsxError> {
    if let Some(v) = v.filter(|v| v.is_finite()) {
        sheet.write_number(row, col, v)?;
    }
    Ok(())
}

fn write_row(sheet: &mut Worksheet, row: u32, scan: &ScanRow) -> Result<(), XlsxError> {
    sheet.write_string(row, 0, &scan.ticker)?;

    let mut col: u16 = 1;
    for field in Column::REQUESTED {
        if field.is_text() {
            if let Some(s) = scan.text(field) {
                sheet.write_string(row, col, s)?;
            }
        } else {
            write_number(sheet, row, col, scan.number(field))?;
        }
        col += 1;
    }

    let local = scan.enrichment.as_ref();
    write_number(sheet, row, col, local.map(|e| e.rsi_14))?;
    write_number(sheet, row, col + 1, local.map(|e| e.atr_14))?;
    Ok(())
}

/// Renders one header row plus one row per scan result.
pub fn write_xlsx(rows: &[ScanRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet
        .set_name(SHEET_NAME)
        .context("failed to name export sheet")?;

    for (col, header) in headers().into_iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, header, &bold)
            .with_context(|| format!("failed to write header {header}"))?;
    }
    for (i, row) in rows.iter().enumerate() {
        write_row(sheet, i as u32 + 1, row)
            .with_context(|| format!("failed to write row {}", row.ticker))?;
    }

    workbook
        .save_to_buffer()
        .context("failed to serialize xlsx workbook")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scan::EnrichedRow;
    use std::io::{Cursor, Read};

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn workbook_contains_header_and_one_row_per_result() {
        let mut a = ScanRow::new("NSE:M&M");
        a.name = Some("M&M".to_string());
        a.rsi = Some(62.5);
        a.enrichment = Some(EnrichedRow {
            ticker: "NSE:M&M".to_string(),
            rsi_14: 61.0,
            atr_14: 42.25,
            bars: 124,
        });
        let mut b = ScanRow::new("NSE:ITC");
        b.close = Some(f64::NAN);

        let bytes = write_xlsx(&[a, b]).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");

        assert_eq!(sheet.matches("<row ").count(), 3);
        // ticker + 19 fields + 2 local indicators: local RSI lands in column U.
        assert!(sheet.contains(r#"r="U2""#));
        assert!(sheet.contains("<v>42.25</v>"));
        assert!(sheet.contains("<v>62.5</v>"));
        assert!(!sheet.contains(r#"r="U3""#));

        let strings = read_part(&bytes, "xl/sharedStrings.xml");
        assert!(strings.contains(">ticker<"));
        assert!(strings.contains("NSE:M&amp;M"));
        assert!(strings.contains("NSE:ITC"));

        let workbook = read_part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains(r#"name="Screener""#));
    }

    #[test]
    fn empty_result_still_has_header() {
        let bytes = write_xlsx(&[]).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert_eq!(sheet.matches("<row ").count(), 1);
        assert_eq!(headers().len(), 22);
    }
}
