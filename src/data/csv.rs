use std::path::Path;

use serde_json::{Map, Value};

use crate::data::Table;

#[derive(Debug, Clone, Default)]
pub struct CsvOptions {
    pub separator: Option<u8>,
    pub encoding: Option<String>,
}

pub fn detect_separator(first_line: &str) -> u8 {
    let candidates: &[(u8, char)] = &[(b',', ','), (b';', ';'), (b'|', '|'), (b'\t', '\t')];
    candidates
        .iter()
        .max_by_key(|(_, ch)| first_line.chars().filter(|c| c == ch).count())
        .map(|(byte, _)| *byte)
        .unwrap_or(b',')
}

pub fn decode_bytes(bytes: &[u8], hint: Option<&str>) -> String {
    if let Some(label) = hint {
        let encoding =
            encoding_rs::Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::WINDOWS_1252);
        let (decoded, _, _) = encoding.decode(bytes);
        return decoded.into_owned();
    }

    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => s,
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

pub fn load_csv(path: &Path, opts: &CsvOptions) -> crate::Result<Table> {
    let bytes = std::fs::read(path).map_err(|source| crate::MailbatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_csv(path, &bytes, opts)
}

pub(crate) fn parse_csv(path: &Path, bytes: &[u8], opts: &CsvOptions) -> crate::Result<Table> {
    let content = decode_bytes(bytes, opts.encoding.as_deref());
    // A UTF-8 BOM would otherwise end up in the first header name.
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);

    let delimiter = if let Some(sep) = opts.separator {
        sep
    } else {
        let first_line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        detect_separator(first_line)
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = {
        let h = reader
            .headers()
            .map_err(|source| crate::MailbatchError::CsvParse {
                path: path.to_path_buf(),
                source,
            })?;
        if h.is_empty() {
            return Err(crate::MailbatchError::CsvNoHeaders {
                path: path.to_path_buf(),
            });
        }
        h.iter().map(String::from).collect()
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| crate::MailbatchError::CsvParse {
            path: path.to_path_buf(),
            source,
        })?;
        let mut map = Map::new();
        for (key, val) in headers.iter().zip(record.iter()) {
            map.insert(key.clone(), Value::String(val.to_string()));
        }
        rows.push(map);
    }

    Ok(Table::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &[u8], opts: &CsvOptions) -> crate::Result<Table> {
        parse_csv(Path::new("<test>"), content, opts)
    }

    #[test]
    fn test_parse_csv_comma() {
        let t = parse(
            b"recipient_email_address,name\na@x.com,Ann\nb@x.com,Bob\n",
            &CsvOptions::default(),
        )
        .unwrap();
        assert_eq!(t.columns, vec!["recipient_email_address", "name"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.rows[1]["name"], "Bob");
    }

    #[test]
    fn test_parse_csv_semicolon_autodetect() {
        let t = parse(b"email;name;age\na@x.com;Ann;30\n", &CsvOptions::default()).unwrap();
        assert_eq!(t.columns.len(), 3);
        assert_eq!(t.rows[0]["age"], "30");
    }

    #[test]
    fn test_parse_csv_quoted_json_cell() {
        let t = parse(
            b"email,files\na@x.com,\"[\"\"a.pdf\"\",\"\"b.csv\"\"]\"\n",
            &CsvOptions::default(),
        )
        .unwrap();
        assert_eq!(t.rows[0]["files"], r#"["a.pdf","b.csv"]"#);
    }

    #[test]
    fn test_parse_csv_strips_bom() {
        let t = parse(b"\xEF\xBB\xBFemail,name\na@x.com,Ann\n", &CsvOptions::default()).unwrap();
        assert_eq!(t.columns[0], "email");
    }

    #[test]
    fn test_parse_csv_windows1252_fallback() {
        // 0xE9 is 'é' in Windows-1252 and invalid as a lone UTF-8 byte.
        let t = parse(b"email,name\na@x.com,Ren\xE9e\n", &CsvOptions::default()).unwrap();
        assert_eq!(t.rows[0]["name"], "Renée");
    }

    #[test]
    fn test_parse_csv_explicit_separator_override() {
        let opts = CsvOptions {
            separator: Some(b','),
            encoding: None,
        };
        let t = parse(b"a;b\n1;2\n", &opts).unwrap();
        assert_eq!(t.columns, vec!["a;b"]);
    }

    #[test]
    fn test_load_csv_missing_file() {
        let result = load_csv(Path::new("/nonexistent/table.csv"), &CsvOptions::default());
        assert!(matches!(result, Err(crate::MailbatchError::Io { .. })));
    }

    #[test]
    fn test_detect_separator_comma() {
        assert_eq!(detect_separator("a,b,c,d"), b',');
    }

    #[test]
    fn test_detect_separator_semicolon() {
        assert_eq!(detect_separator("a;b;c;d"), b';');
    }

    #[test]
    fn test_detect_separator_pipe() {
        assert_eq!(detect_separator("a|b|c|d"), b'|');
    }

    #[test]
    fn test_detect_separator_tab() {
        assert_eq!(detect_separator("a\tb\tc\td"), b'\t');
    }
}
