//! JSONL storage: one flat record per line.

use crate::error::SurrogateError;
use crate::record::FlatRecord;
use std::io::{BufRead, Write};

/// Read records from a JSONL reader. Blank lines and `#` comments are skipped.
pub fn read_records(reader: impl BufRead) -> Result<Vec<FlatRecord>, SurrogateError> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SurrogateError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: FlatRecord = serde_json::from_str(trimmed)
            .map_err(|e| SurrogateError::Parse(line_no + 1, e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

pub fn write_records(writer: &mut impl Write, records: &[FlatRecord]) -> Result<(), SurrogateError> {
    for (line_no, record) in records.iter().enumerate() {
        let line = record.to_json()?;
        writeln!(writer, "{line}").map_err(|e| SurrogateError::Io(line_no + 1, e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RECORD_KIND, RECORD_SCHEMA};
    use mixweave_kernel::{CompositionRequest, FieldState};
    use serde_json::json;
    use std::io;

    /// Accepts `room` bytes, then fails every write.
    struct Full {
        room: usize,
    }

    impl Write for Full {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = self.room.min(buf.len());
            if n == 0 {
                return Err(io::Error::other("disk full"));
            }
            self.room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(total: i64) -> FlatRecord {
        let configuration = CompositionRequest::new("Order").normalize().unwrap();
        FlatRecord {
            schema: RECORD_SCHEMA,
            record_kind: RECORD_KIND.to_string(),
            configuration_key: configuration.key(),
            configuration,
            target_fields: FieldState::from([("total".to_string(), json!(total))]),
            mixins: Vec::new(),
        }
    }

    #[test]
    fn records_survive_a_jsonl_file() {
        let records = vec![record(1), record(2)];
        let mut buffer = Vec::new();
        write_records(&mut buffer, &records).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 2);

        let with_comment = format!("# saved orders\n\n{text}");
        let read = read_records(with_comment.as_bytes()).unwrap();
        assert_eq!(read, records);
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        let err = read_records("\n{not json}\n".as_bytes()).unwrap_err();
        assert!(matches!(err, SurrogateError::Parse(2, _)));
    }

    #[test]
    fn write_errors_carry_the_record_position() {
        let records = vec![record(1), record(2)];
        let first_line = records[0].to_json().unwrap().len() + 1;
        let mut writer = Full { room: first_line };
        let err = write_records(&mut writer, &records).unwrap_err();
        assert!(matches!(err, SurrogateError::Io(2, _)));
        assert_eq!(err.to_string(), "line 2: io error: disk full");
    }
}
