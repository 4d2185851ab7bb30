//! `ParseUpload`: turns one multipart HTTP request into the fields a
//! fresh [`haystack_storage::Needle`] needs.

use std::io::Write as _;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::ServerResult;
use crate::http::Request;
use crate::mime_type::{extension_of, is_gzippable, resolve_mime_type};
use crate::multipart::{parse_boundary, parse_multipart};

pub struct ParsedUpload {
    pub file_name: String,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub is_gzipped: bool,
    pub modified_time: Option<u64>,
}

/// Implements the upload parsing contract of §6:
///
/// 1. `Content-Type` comes from the part header if present, else from
///    the filename extension.
/// 2. `Content-Encoding: gzip` on the part marks the data already
///    gzipped.
/// 3. Otherwise, if the extension/MIME type is in the gzippable set, the
///    body is compressed here (gzip, best compression) and marked
///    gzipped.
/// 4. A `.gz`-suffixed filename is marked gzipped without recompression.
/// 5. A trailing `.gz` is stripped from the filename.
pub fn parse_upload(request: &Request) -> ServerResult<ParsedUpload> {
    let content_type_header = request
        .header("Content-Type")
        .ok_or_else(|| crate::error::ServerError::MalformedUpload("missing Content-Type".into()))?;
    let boundary = parse_boundary(content_type_header)?;
    let (file, ts_field) = parse_multipart(&request.body, &boundary)?;

    let ext = extension_of(&file.filename);
    let mime_type = resolve_mime_type(ext.as_deref(), file.content_type.as_deref());

    let mut data = file.data;
    let mut is_gzipped = file.content_encoding.as_deref() == Some("gzip");

    if !is_gzipped && is_gzippable(ext.as_deref(), &mime_type) {
        data = gzip_best_compression(&data)?;
        is_gzipped = true;
    }

    // An already-`.gz` upload is assumed pre-compressed: mark it gzipped
    // without compressing again, even though `.gz` itself is excluded
    // from the gzippable set above.
    if ext.as_deref() == Some(".gz") {
        is_gzipped = true;
    }

    let mut file_name = file.filename;
    if let Some(stripped) = file_name.strip_suffix(".gz") {
        file_name = stripped.to_string();
    }

    let modified_time = ts_field.and_then(|ts| ts.parse::<u64>().ok());

    Ok(ParsedUpload {
        file_name,
        data,
        mime_type,
        is_gzipped,
        modified_time,
    })
}

fn gzip_best_compression(data: &[u8]) -> ServerResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompresses a needle's stored bytes on read, when it was stored
/// gzipped. Resolves the source's dangling gzip/Content-Encoding
/// question in favor of the server decompressing before the client ever
/// sees the bytes.
pub fn gunzip(data: &[u8]) -> ServerResult<Vec<u8>> {
    use std::io::Read;
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
