use crate::models::ListingRow;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Column headers of the results file, in the operator's language
pub const RESULT_HEADERS: [&str; 9] = [
    "주소", "동/읍/면", "제목", "가격", "등록시간", "판매자", "판매완료", "링크", "썸네일",
];

/// Read every record of a UTF-8 CSV file, tolerating a leading BOM
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let records = reader
        .deserialize()
        .enumerate()
        .map(|(idx, row)| row.with_context(|| format!("{}: bad record {}", path.display(), idx + 2)))
        .collect::<Result<Vec<T>>>()?;
    Ok(records)
}

/// Write serializable records as CSV with a UTF-8 BOM
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!("💾 Saved {} rows to {}", records.len(), path.display());
    Ok(())
}

/// Flatten a result row into the exported cells
pub fn result_cells(row: &ListingRow) -> [String; 9] {
    let listing = &row.listing;
    [
        row.address.clone(),
        row.region_name.clone(),
        listing.title.clone(),
        listing.price.map(|p| p.to_string()).unwrap_or_default(),
        listing
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S%:z").to_string())
            .unwrap_or_default(),
        listing.seller.clone(),
        sold_label(row).to_string(),
        listing.href.clone(),
        listing.thumbnail.clone().unwrap_or_default(),
    ]
}

fn sold_label(row: &ListingRow) -> &'static str {
    if row.listing.is_sold() {
        "예"
    } else {
        "아니오"
    }
}

/// Encode result rows as CSV bytes (UTF-8 with BOM)
pub fn results_to_csv(rows: &[ListingRow]) -> Result<Vec<u8>> {
    let mut buf = UTF8_BOM.to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record(RESULT_HEADERS)?;
        for row in rows {
            writer.write_record(result_cells(row))?;
        }
        writer.flush()?;
    }
    Ok(buf)
}

pub fn write_results(path: &Path, rows: &[ListingRow]) -> Result<()> {
    let bytes = results_to_csv(rows)?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("💾 Saved {} listings to {}", rows.len(), path.display());
    Ok(())
}

/// How results are shown on the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum View {
    #[default]
    Table,
    Cards,
}

/// Render rows to a writer in the chosen view
pub fn render<W: Write>(mut out: W, rows: &[ListingRow], view: View) -> std::io::Result<()> {
    match view {
        View::Table => {
            writeln!(out, "{}", RESULT_HEADERS[..8].join(" | "))?;
            for row in rows {
                let cells = result_cells(row);
                writeln!(out, "{}", cells[..8].join(" | "))?;
            }
        }
        View::Cards => {
            for row in rows {
                let listing = &row.listing;
                writeln!(out, "{}", listing.title)?;
                match listing.price {
                    Some(price) => writeln!(out, "   💰 {price}원")?,
                    None => writeln!(out, "   💰 -")?,
                }
                writeln!(out, "   📍 {} | {}", row.region_name, row.address)?;
                if let Some(created) = listing.created_at {
                    writeln!(out, "   🕒 {}", created.format("%Y-%m-%d %H:%M"))?;
                }
                writeln!(out, "   👤 {} | 판매완료: {}", listing.seller, sold_label(row))?;
                writeln!(out, "   🔗 {}", listing.href)?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{parse_timestamp, Listing, RegionMapping};

    fn row(price: Option<i64>, status: &str) -> ListingRow {
        ListingRow {
            address: "서울특별시 강남구".to_string(),
            region_name: "역삼동".to_string(),
            listing: Listing {
                title: "게이밍 노트북, 3060".to_string(),
                content: "거의 새것".to_string(),
                price,
                created_at: parse_timestamp("2024-05-01T10:30:00+09:00"),
                status: status.to_string(),
                href: "https://www.daangn.com/kr/buy-sell/1".to_string(),
                thumbnail: None,
                seller: "당근이".to_string(),
            },
        }
    }

    #[test]
    fn csv_starts_with_bom_and_korean_headers() {
        let bytes = results_to_csv(&[row(Some(900_000), "Ongoing")]).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("주소,동/읍/면,제목,가격,등록시간,판매자,판매완료,링크,썸네일"));
        let data = lines.next().unwrap();
        assert!(data.contains("\"게이밍 노트북, 3060\""));
        assert!(data.contains(",900000,"));
        assert!(data.contains(",아니오,"));
    }

    #[test]
    fn absent_price_is_an_empty_cell() {
        let cells = result_cells(&row(None, "closed"));
        assert_eq!(cells[3], "");
        assert_eq!(cells[6], "예");
    }

    #[test]
    fn cards_show_price_and_time() {
        let mut out = Vec::new();
        render(&mut out, &[row(Some(5000), "Ongoing")], View::Cards).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("5000원"));
        assert!(text.contains("2024-05-01 10:30"));
    }

    #[test]
    fn records_round_trip_through_bom_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        let mappings = vec![RegionMapping {
            query: "서울특별시 강남구".to_string(),
            region_name: "역삼동".to_string(),
            region_code: "6035".to_string(),
            link_text: "서울특별시 강남구, 역삼동".to_string(),
            link_href: "https://www.daangn.com/kr/buy-sell/?in=역삼동-6035".to_string(),
        }];

        write_records(&path, &mappings).unwrap();
        let raw = std::fs::read(&path).unwrap();
        assert!(raw.starts_with(UTF8_BOM));

        let back: Vec<RegionMapping> = read_records(&path).unwrap();
        assert_eq!(back, mappings);
    }
}
