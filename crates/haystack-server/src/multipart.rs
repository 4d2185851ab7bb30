//! A hand-rolled multipart/form-data reader, extracting the single file
//! part and the optional `ts` field the upload contract needs.

use crate::error::{ServerError, ServerResult};

pub struct FilePart {
    pub filename: String,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub data: Vec<u8>,
}

/// Parses `Content-Type: multipart/form-data; boundary=...` into just the
/// boundary token.
pub fn parse_boundary(content_type: &str) -> ServerResult<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("boundary="))
        .map(|b| b.trim_matches('"').to_string())
        .ok_or_else(|| ServerError::MalformedUpload("Content-Type has no boundary".into()))
}

/// Splits a multipart body into its parts and returns the first file part
/// (one with a `filename=` in its `Content-Disposition`) plus the `ts`
/// form field, if present.
pub fn parse_multipart(body: &[u8], boundary: &str) -> ServerResult<(FilePart, Option<String>)> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut file_part = None;
    let mut ts_field = None;

    for segment in split_on_delimiter(body, &delimiter) {
        if segment.is_empty() || segment == b"--\r\n" || segment == b"--" {
            continue;
        }
        let segment = trim_leading_crlf(segment);
        let Some(header_end) = find_subslice(segment, b"\r\n\r\n") else {
            continue;
        };
        let header_block = &segment[..header_end];
        let mut content = &segment[header_end + 4..];
        content = content.strip_suffix(b"\r\n").unwrap_or(content);

        let headers = parse_part_headers(header_block);
        let disposition = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-disposition"))
            .map(|(_, v)| v.as_str())
            .unwrap_or("");

        if let Some(filename) = extract_disposition_param(disposition, "filename") {
            if file_part.is_none() {
                let content_type = headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                    .map(|(_, v)| v.clone());
                let content_encoding = headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-encoding"))
                    .map(|(_, v)| v.clone());
                file_part = Some(FilePart {
                    filename,
                    content_type,
                    content_encoding,
                    data: content.to_vec(),
                });
            }
        } else if extract_disposition_param(disposition, "name").as_deref() == Some("ts") {
            ts_field = Some(String::from_utf8_lossy(content).into_owned());
        }
    }

    let file_part = file_part.ok_or_else(|| ServerError::MalformedUpload("no file part found".into()))?;
    Ok((file_part, ts_field))
}

fn trim_leading_crlf(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\r\n").unwrap_or(bytes)
}

fn parse_part_headers(block: &[u8]) -> Vec<(String, String)> {
    String::from_utf8_lossy(block)
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

fn extract_disposition_param(disposition: &str, key: &str) -> Option<String> {
    disposition.split(';').map(str::trim).find_map(|part| {
        let prefix = format!("{key}=");
        part.strip_prefix(&prefix).map(|v| v.trim_matches('"').to_string())
    })
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_on_delimiter<'a>(body: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut segments = Vec::new();
    let mut rest = body;
    while let Some(pos) = find_subslice(rest, delimiter) {
        if pos > 0 {
            segments.push(&rest[..pos]);
        }
        rest = &rest[pos + delimiter.len()..];
    }
    segments
}
