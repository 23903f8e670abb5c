//! CSV output for query results.

use crate::domain::error::EarniError;
use crate::domain::value::{Row, Value};
use std::io::Write;

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Date(v) => v.format("%Y-%m-%d").to_string(),
    }
}

/// Write `headers` (when given) followed by every row.
pub fn write_rows<W: Write>(
    writer: W,
    headers: Option<&[String]>,
    rows: &[Row],
) -> Result<(), EarniError> {
    let mut wtr = csv::Writer::from_writer(writer);
    let csv_err = |e: csv::Error| EarniError::Io(std::io::Error::other(e));

    if let Some(headers) = headers {
        wtr.write_record(headers).map_err(csv_err)?;
    }
    for row in rows {
        wtr.write_record(row.iter().map(cell)).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn writes_header_and_rows() {
        let mut out = Vec::new();
        let headers = vec!["ticker".to_string(), "close_plus_1".to_string()];
        let rows = vec![
            vec![Value::Text("AAPL".into()), Value::Int(18_650)],
            vec![Value::Text("MSFT".into()), Value::Null],
        ];
        write_rows(&mut out, Some(&headers), &rows).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ticker,close_plus_1\nAAPL,18650\nMSFT,\n"
        );
    }

    #[test]
    fn quotes_text_with_commas() {
        let mut out = Vec::new();
        let rows = vec![vec![
            Value::Text("Dec, 2023".into()),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 25).unwrap()),
            Value::Float(0.5),
            Value::Bool(true),
        ]];
        write_rows(&mut out, None, &rows).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\"Dec, 2023\",2024-01-25,0.5,true\n"
        );
    }
}
