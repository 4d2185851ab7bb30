//! The three routes of §6: `POST /write`, `GET /read/{...}`, `POST /join`.

use haystack_replicate::{ConsensusLog, WriteCommand};
use haystack_storage::Needle;
use haystack_types::{Cookie, VolumeId};
use rand::Rng;
use tracing::{error, info};

use crate::http::{Request, Response};
use crate::upload::{gunzip, parse_upload};

/// `POST /write`. Parses the multipart upload, assigns a cookie and a
/// free volume, and submits the replicated write command.
///
/// On success the body is `"<vid>\n\n<json of WriteRes>"`. On
/// [`haystack_replicate::ReplicateError::NotLeader`] the body is instead
/// the leader's connection string, per the follower-redirect convention.
pub fn write_handler(request: &Request, log: &dyn ConsensusLog) -> Response {
    let upload = match parse_upload(request) {
        Ok(upload) => upload,
        Err(e) => return Response::bad_request(e.to_string()),
    };

    let cookie: Cookie = rand::thread_rng().gen();
    let mut needle = match Needle::new(cookie, upload.data) {
        Ok(needle) => needle,
        Err(e) => return Response::bad_request(e.to_string()),
    };
    needle = needle.with_name(upload.file_name.clone().into_bytes());
    if !upload.mime_type.is_empty() {
        needle = needle.with_mime(upload.mime_type.clone().into_bytes());
    }
    if let Some(modified_time) = upload.modified_time {
        needle = needle.with_last_modified(modified_time);
    }
    if upload.is_gzipped {
        needle.set_gzipped();
    }

    let vid = log.free_volume();
    let command = WriteCommand::new(vid, &needle);

    match log.do_command(command) {
        Ok(res) => {
            info!(volume = %vid, cookie, offset = res.offset, size = res.size, "wrote needle");
            let body = serde_json::json!({
                "Vid": res.vid.as_u32(),
                "Cookie": res.cookie,
                "Offset": res.offset,
                "Size": res.size,
            });
            Response::ok(format!("{}\n\n{}", vid, body).into_bytes())
        }
        Err(haystack_replicate::ReplicateError::NotLeader(leader)) => {
            let body = leader.unwrap_or_default();
            Response::ok_text(body)
        }
        Err(e) => {
            error!(error = %e, "write failed");
            Response::internal_error(e.to_string())
        }
    }
}

/// `GET /read/{vid}/{offset}/{size}/{cookie}`. Writes `Data` bytes with
/// no content-type (the frontend's responsibility in a real deployment,
/// per §6).
pub fn read_handler(vid: VolumeId, offset: u64, size: u32, cookie: Cookie, log: &dyn ConsensusLog) -> Response {
    match log.read(vid, offset, size, cookie) {
        Ok(needle) => {
            let data = if needle.is_gzipped() {
                match gunzip(&needle.data) {
                    Ok(data) => data,
                    Err(e) => return Response::internal_error(e.to_string()),
                }
            } else {
                needle.data
            };
            Response::ok(data)
        }
        Err(haystack_replicate::ReplicateError::Store(haystack_store::StoreError::NoVolume(_))) => {
            Response::not_found("no such volume")
        }
        Err(haystack_replicate::ReplicateError::Storage(haystack_storage::StorageError::NotFound)) => {
            Response::not_found("needle not found")
        }
        Err(haystack_replicate::ReplicateError::Storage(haystack_storage::StorageError::CapabilityMismatch)) => {
            Response::bad_request("cookie or size does not match")
        }
        Err(e) => Response::internal_error(e.to_string()),
    }
}

/// `POST /join`. Opaque to the core (§6) — delegated to the consensus
/// collaborator's own membership transport. The reference `SoloLog`
/// never has peers to add, so this always reports success.
pub fn join_handler(_request: &Request, log: &dyn ConsensusLog) -> Response {
    info!(peers = ?log.peers(), "join request received");
    Response::ok_text("ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use haystack_store::{DiskLocation, Store};
    use haystack_replicate::SoloLog;
    use tempfile::tempdir;

    fn multipart_request(filename: &str, body: &str) -> Request {
        let boundary = "BOUNDARY";
        let multipart_body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             \r\n\
             {body}\r\n\
             --{boundary}--\r\n"
        );
        Request {
            method: "POST".to_string(),
            path: "/write".to_string(),
            headers: vec![(
                "Content-Type".to_string(),
                format!("multipart/form-data; boundary={boundary}"),
            )],
            body: multipart_body.into_bytes(),
        }
    }

    fn solo_log_with_volume(vid: u32) -> (tempfile::TempDir, SoloLog) {
        let dir = tempdir().unwrap();
        let mut location = DiskLocation::new(dir.path()).unwrap();
        location.add_volume(VolumeId::new(vid), "photo").unwrap();
        let store = Store::new(vec![location], vec![VolumeId::new(vid)]);
        (dir, SoloLog::new(store, "localhost:4001"))
    }

    #[test]
    fn write_then_read_round_trips_through_the_handlers() {
        let (_dir, log) = solo_log_with_volume(1);
        let request = multipart_request("hello.txt", "hello world");

        let write_response = write_handler(&request, &log);
        assert_eq!(write_response.status, 200);
        let body = String::from_utf8(write_response.body).unwrap();
        let (vid_line, json_part) = body.split_once("\n\n").unwrap();
        assert_eq!(vid_line, "1");
        let parsed: serde_json::Value = serde_json::from_str(json_part).unwrap();
        let offset = parsed["Offset"].as_u64().unwrap();
        let size = parsed["Size"].as_u64().unwrap() as u32;
        let cookie = parsed["Cookie"].as_u64().unwrap() as u32;

        let read_response = read_handler(VolumeId::new(1), offset, size, cookie, &log);
        assert_eq!(read_response.status, 200);
        // hello.txt is gzippable; the handler decompresses before responding.
        assert_eq!(read_response.body, b"hello world");
    }

    #[test]
    fn read_with_wrong_cookie_is_bad_request() {
        let (_dir, log) = solo_log_with_volume(1);
        let request = multipart_request("photo.png", "binary");
        let write_response = write_handler(&request, &log);
        let body = String::from_utf8(write_response.body).unwrap();
        let (_, json_part) = body.split_once("\n\n").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(json_part).unwrap();
        let offset = parsed["Offset"].as_u64().unwrap();
        let size = parsed["Size"].as_u64().unwrap() as u32;

        let read_response = read_handler(VolumeId::new(1), offset, size, 0, &log);
        assert_eq!(read_response.status, 400);
    }

    #[test]
    fn write_against_a_follower_returns_the_leader_address() {
        let follower = haystack_replicate::StubFollower {
            leader_address: Some("http://leader:4001".to_string()),
        };
        let request = multipart_request("hello.txt", "hello world");
        let response = write_handler(&request, &follower);
        assert_eq!(response.status, 200);
        assert_eq!(String::from_utf8(response.body).unwrap(), "http://leader:4001");
    }

    #[test]
    fn join_reports_ok() {
        let (_dir, log) = solo_log_with_volume(1);
        let request = Request {
            method: "POST".to_string(),
            path: "/join".to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        let response = join_handler(&request, &log);
        assert_eq!(response.status, 200);
    }
}
