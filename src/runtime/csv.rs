// Buffered CSV record reader. Reads the file through a fixed 64 KiB buffer
// and reassembles records that span refills into a growable line buffer,
// capped at 1 GiB. Record boundaries are quote-aware: a newline inside a
// quoted field does not terminate the record. The reader is fail-fast and
// reports the offending line number on any malformed input.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{DbError, Result};
use crate::types::{LogicalType, Value};

pub const READ_BUFFER_SIZE: usize = 64 * 1024;
pub const MAX_LINE_SIZE: usize = 1 << 30;

#[derive(Debug, Clone, Copy)]
pub struct CsvFormat {
    pub delimiter: u8,
    pub quote: u8,
    pub escape: u8,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self { delimiter: b',', quote: b'"', escape: b'"' }
    }
}

/// Counters kept while scanning.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvStats {
    /// Refill-spanning copies into the line buffer.
    pub num_copies: u32,
    /// Line-buffer growths needed for long records.
    pub num_reallocs: u32,
    /// Read() calls against the file.
    pub num_reads: u32,
}

pub struct CsvReader {
    file: File,
    format: CsvFormat,
    buffer: Vec<u8>,
    buffer_pos: usize,
    buffer_end: usize,
    eof: bool,
    line: Vec<u8>,
    line_number: u64,
    stats: CsvStats,
}

enum ScanState {
    FieldStart,
    Unquoted,
    Quoted,
    QuotedEscape,
    /// Saw the quote character inside a quoted field when escape == quote;
    /// the next byte decides between an escaped quote and a field close.
    QuotedMaybeEnd,
    AfterQuote,
}

impl CsvReader {
    pub fn open(path: impl AsRef<Path>, format: CsvFormat) -> Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path).map_err(|_| {
            DbError::Execution(format!("input path '{}' does not exist", path.display()))
        })?;
        if !meta.is_file() {
            return Err(DbError::Execution(format!(
                "input '{}' is not a regular file",
                path.display()
            )));
        }
        let file = File::open(path)?;
        Ok(Self {
            file,
            format,
            buffer: vec![0; READ_BUFFER_SIZE],
            buffer_pos: 0,
            buffer_end: 0,
            eof: false,
            line: Vec::new(),
            line_number: 0,
            stats: CsvStats::default(),
        })
    }

    pub fn stats(&self) -> CsvStats {
        self.stats
    }

    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    fn refill(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        self.stats.num_reads += 1;
        let n = self.file.read(&mut self.buffer)?;
        self.buffer_pos = 0;
        self.buffer_end = n;
        if n == 0 {
            self.eof = true;
        }
        Ok(n > 0)
    }

    fn append_to_line(&mut self, from: usize, to: usize) -> Result<()> {
        let chunk = to - from;
        if self.line.len() + chunk > MAX_LINE_SIZE {
            return Err(DbError::LineTooLong(self.line_number + 1));
        }
        if self.line.len() + chunk > self.line.capacity() && !self.line.is_empty() {
            self.stats.num_reallocs += 1;
        }
        self.stats.num_copies += 1;
        self.line.extend_from_slice(&self.buffer[from..to]);
        Ok(())
    }

    /// Assemble the next record (without its terminating newline). Returns
    /// None at end of input.
    fn next_record(&mut self) -> Result<Option<&[u8]>> {
        self.line.clear();
        let mut state = ScanState::FieldStart;
        let fmt = self.format;

        loop {
            if self.buffer_pos >= self.buffer_end {
                if !self.refill()? {
                    break;
                }
            }
            let start = self.buffer_pos;
            let mut end_of_record = None;
            let mut i = start;
            while i < self.buffer_end {
                let c = self.buffer[i];
                state = match state {
                    ScanState::FieldStart => {
                        if c == fmt.quote {
                            ScanState::Quoted
                        } else if c == fmt.delimiter {
                            ScanState::FieldStart
                        } else if c == b'\n' {
                            end_of_record = Some(i);
                            break;
                        } else {
                            ScanState::Unquoted
                        }
                    }
                    ScanState::Unquoted | ScanState::AfterQuote => {
                        if c == fmt.delimiter {
                            ScanState::FieldStart
                        } else if c == b'\n' {
                            end_of_record = Some(i);
                            break;
                        } else {
                            ScanState::Unquoted
                        }
                    }
                    ScanState::Quoted => {
                        if c == fmt.quote && fmt.escape == fmt.quote {
                            ScanState::QuotedMaybeEnd
                        } else if c == fmt.escape {
                            ScanState::QuotedEscape
                        } else if c == fmt.quote {
                            ScanState::AfterQuote
                        } else {
                            ScanState::Quoted
                        }
                    }
                    ScanState::QuotedEscape => ScanState::Quoted,
                    ScanState::QuotedMaybeEnd => {
                        if c == fmt.quote {
                            ScanState::Quoted
                        } else if c == fmt.delimiter {
                            ScanState::FieldStart
                        } else if c == b'\n' {
                            end_of_record = Some(i);
                            break;
                        } else {
                            ScanState::Unquoted
                        }
                    }
                };
                i += 1;
            }

            match end_of_record {
                Some(end) => {
                    let had_spill = !self.line.is_empty();
                    if had_spill {
                        self.append_to_line(start, end)?;
                        self.buffer_pos = end + 1;
                        self.line_number += 1;
                        strip_carriage_return(&mut self.line);
                        return Ok(Some(&self.line));
                    }
                    // Record fully inside the read buffer: hand out a slice
                    // of it without copying.
                    self.buffer_pos = end + 1;
                    self.line_number += 1;
                    let mut rec = &self.buffer[start..end];
                    if rec.last() == Some(&b'\r') {
                        rec = &rec[..rec.len() - 1];
                    }
                    return Ok(Some(rec));
                }
                None => {
                    self.append_to_line(start, self.buffer_end)?;
                    self.buffer_pos = self.buffer_end;
                }
            }
        }

        // End of input: whatever is buffered is the final record.
        if self.line.is_empty() {
            return Ok(None);
        }
        if matches!(state, ScanState::Quoted | ScanState::QuotedEscape) {
            return Err(DbError::CsvParse {
                line: self.line_number + 1,
                message: "unterminated quoted field".into(),
            });
        }
        self.line_number += 1;
        strip_carriage_return(&mut self.line);
        Ok(Some(&self.line))
    }

    /// Read and split the next record into `num_cols` fields. Returns None
    /// at end of input.
    pub fn next_row(&mut self, num_cols: usize) -> Result<Option<Vec<String>>> {
        let format = self.format;
        let line_number = self.line_number + 1;
        let record = match self.next_record()? {
            Some(r) => r,
            None => return Ok(None),
        };
        let fields = split_record(record, format, line_number)?;
        if fields.len() != num_cols {
            return Err(DbError::CsvParse {
                line: line_number,
                message: format!("expected {num_cols} fields, found {}", fields.len()),
            });
        }
        Ok(Some(fields))
    }
}

fn strip_carriage_return(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}

/// Split one assembled record into unescaped fields.
fn split_record(record: &[u8], fmt: CsvFormat, line: u64) -> Result<Vec<String>> {
    let err = |message: String| DbError::CsvParse { line, message };
    let mut fields = Vec::new();
    let mut field = Vec::new();
    let mut i = 0;
    let n = record.len();

    loop {
        field.clear();
        if i < n && record[i] == fmt.quote {
            // Quoted field.
            i += 1;
            let mut closed = false;
            while i < n {
                let c = record[i];
                if c == fmt.escape && fmt.escape != fmt.quote {
                    if i + 1 >= n {
                        return Err(err("dangling escape character".into()));
                    }
                    field.push(record[i + 1]);
                    i += 2;
                    continue;
                }
                if c == fmt.quote {
                    if fmt.escape == fmt.quote && i + 1 < n && record[i + 1] == fmt.quote {
                        field.push(fmt.quote);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    closed = true;
                    break;
                }
                field.push(c);
                i += 1;
            }
            if !closed {
                return Err(err("unterminated quoted field".into()));
            }
            if i < n && record[i] != fmt.delimiter {
                return Err(err("expected delimiter after closing quote".into()));
            }
        } else {
            // Unquoted field: everything up to the delimiter is literal.
            while i < n && record[i] != fmt.delimiter {
                field.push(record[i]);
                i += 1;
            }
        }
        let text = String::from_utf8(std::mem::take(&mut field))
            .map_err(|_| err("field is not valid UTF-8".into()))?;
        fields.push(text);
        if i >= n {
            break;
        }
        i += 1; // consume the delimiter
        if i == n {
            // Trailing delimiter produces a final empty field.
            fields.push(String::new());
            break;
        }
    }
    Ok(fields)
}

/// Parse one field into a typed value.
pub fn parse_field(ty: LogicalType, text: &str, line: u64) -> Result<Value> {
    let err = |message: String| DbError::CsvParse { line, message };
    match ty {
        LogicalType::Bool => match text {
            "true" | "t" | "1" => Ok(Value::boolean(true)),
            "false" | "f" | "0" => Ok(Value::boolean(false)),
            _ => Err(err(format!("'{text}' is not a BOOL"))),
        },
        LogicalType::TinyInt | LogicalType::SmallInt | LogicalType::Integer | LogicalType::BigInt => {
            let raw = text
                .parse::<i64>()
                .map_err(|_| err(format!("'{text}' is not a {ty}")))?;
            Value::integral(ty, raw).map_err(|_| err(format!("'{text}' out of range for {ty}")))
        }
        LogicalType::Decimal => text
            .parse::<f64>()
            .map(Value::decimal)
            .map_err(|_| err(format!("'{text}' is not a DECIMAL"))),
        LogicalType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Value::date)
            .map_err(|_| err(format!("'{text}' is not a DATE"))),
        LogicalType::Timestamp => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
            .map(Value::timestamp)
            .map_err(|_| err(format!("'{text}' is not a TIMESTAMP"))),
        LogicalType::Varchar => Ok(Value::varchar(text)),
        _ => Err(err(format!("unsupported CSV column type {ty}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn reader_for(content: &str) -> (tempfile::NamedTempFile, CsvReader) {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        let reader = CsvReader::open(f.path(), CsvFormat::default()).unwrap();
        (f, reader)
    }

    #[test]
    fn plain_rows_split_into_fields() {
        let (_f, mut r) = reader_for("1,2,3.0,4\n4,5,6.0,7\n8,9,10.0,11\n");
        let mut rows = 0;
        while let Some(fields) = r.next_row(4).unwrap() {
            assert_eq!(fields.len(), 4);
            rows += 1;
        }
        assert_eq!(rows, 3);
    }

    #[test]
    fn quotes_inside_unquoted_fields_are_literal() {
        let (_f, mut r) = reader_for("yea he's \"cool\",1,2\n");
        let fields = r.next_row(3).unwrap().unwrap();
        assert_eq!(fields[0], "yea he's \"cool\"");
        assert_eq!(fields[1], "1");
        assert_eq!(fields[2], "2");
    }

    #[test]
    fn quoted_fields_unescape_doubled_quotes() {
        let (_f, mut r) = reader_for("\"a,b\",\"he said \"\"hi\"\"\",x\n");
        let fields = r.next_row(3).unwrap().unwrap();
        assert_eq!(fields[0], "a,b");
        assert_eq!(fields[1], "he said \"hi\"");
        assert_eq!(fields[2], "x");
    }

    #[test]
    fn newline_inside_quotes_continues_the_record() {
        let (_f, mut r) = reader_for("\"line1\nline2\",2\nnext,3\n");
        let first = r.next_row(2).unwrap().unwrap();
        assert_eq!(first[0], "line1\nline2");
        let second = r.next_row(2).unwrap().unwrap();
        assert_eq!(second[0], "next");
    }

    #[test]
    fn unterminated_quote_fails() {
        let (_f, mut r) = reader_for("1,\"unclosed,3\n");
        // The open quote swallows the newline, so the failure surfaces as
        // an unterminated field at end of input.
        assert!(matches!(r.next_row(3), Err(DbError::CsvParse { .. })));
    }

    #[test]
    fn garbage_after_closing_quote_fails() {
        let (_f, mut r) = reader_for("\"ok\"junk,2\n");
        assert!(matches!(r.next_row(2), Err(DbError::CsvParse { .. })));
    }

    #[test]
    fn field_count_mismatch_reports_line() {
        let (_f, mut r) = reader_for("1,2\n1,2,3\n");
        assert!(r.next_row(2).unwrap().is_some());
        match r.next_row(2) {
            Err(DbError::CsvParse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn custom_escape_character() {
        let fmt = CsvFormat { delimiter: b',', quote: b'"', escape: b'\\' };
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"\"a\\\"b\",2\n").unwrap();
        f.flush().unwrap();
        let mut r = CsvReader::open(f.path(), fmt).unwrap();
        let fields = r.next_row(2).unwrap().unwrap();
        assert_eq!(fields[0], "a\"b");
    }

    #[test]
    fn records_spanning_the_read_buffer() {
        let long = "x".repeat(READ_BUFFER_SIZE + 100);
        let content = format!("{long},2\nshort,3\n");
        let (_f, mut r) = reader_for(&content);
        let first = r.next_row(2).unwrap().unwrap();
        assert_eq!(first[0].len(), READ_BUFFER_SIZE + 100);
        assert!(r.stats().num_copies > 0);
        let second = r.next_row(2).unwrap().unwrap();
        assert_eq!(second[0], "short");
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(CsvReader::open("/definitely/not/here.csv", CsvFormat::default()).is_err());
    }

    #[test]
    fn typed_parsing() {
        assert_eq!(parse_field(LogicalType::Integer, "42", 1).unwrap(), Value::integer(42));
        assert_eq!(parse_field(LogicalType::Decimal, "3.5", 1).unwrap(), Value::decimal(3.5));
        assert!(parse_field(LogicalType::Integer, "x", 1).is_err());
        assert!(parse_field(LogicalType::Integer, "", 1).is_err());
    }
}
