//! Uncommitted block-list reconciliation.
//!
//! Implements the two-call finalization protocol for uncommitted block
//! blobs: fetch the uncommitted block list (`?comp=blocklist&blocklisttype=all`),
//! extract every block name in document order, and PUT the commit document
//! (`?comp=blocklist`) that promotes the blob to committed.
//!
//! XML is handled with `quick-xml` on both sides.  The parser walks the
//! element tree by local tag name, so attribute order, namespace prefixes,
//! and whitespace variation in the storage service's response are all
//! tolerated.  Extracted names are carried verbatim into the commit
//! document: original order, no deduplication, no trimming.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use tracing::debug;

use crate::context::append_query;
use crate::errors::GatewayError;

/// Content type declared for the finalized blob.
const BLOB_CONTENT_TYPE: &str = "application/octet-stream";

/// Extract every block name under `<UncommittedBlocks>`, in document order.
///
/// Names under `<CommittedBlocks>` are ignored.  Returns an empty vector
/// when the document lists no uncommitted blocks; malformed XML is an
/// unexpected fault.
pub fn parse_uncommitted_block_names(xml: &[u8]) -> Result<Vec<String>, GatewayError> {
    let mut reader = Reader::from_reader(xml);

    let mut names: Vec<String> = Vec::new();
    let mut in_uncommitted = false;
    let mut in_block = false;
    let mut in_name = false;
    let mut current = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"UncommittedBlocks" => in_uncommitted = true,
                b"Block" if in_uncommitted => in_block = true,
                b"Name" if in_block => {
                    in_name = true;
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_name => {
                let text = e
                    .unescape()
                    .map_err(|e| anyhow::anyhow!("Block list XML unescape failed: {}", e))?;
                current.push_str(&text);
            }
            Ok(Event::CData(ref e)) if in_name => {
                current.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"Name" if in_name => {
                    in_name = false;
                    names.push(std::mem::take(&mut current));
                }
                b"Block" => in_block = false,
                b"UncommittedBlocks" => in_uncommitted = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(GatewayError::Internal(anyhow::anyhow!(
                    "Block list XML parse failed: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(names)
}

/// Render the Put Block List commit document.
///
/// Every block is marked `<Latest>`: commit the most recently staged
/// version of each block id, in the given order.
pub fn render_commit_block_list(names: &[String]) -> String {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .expect("xml decl");
    writer
        .write_event(Event::Start(BytesStart::new("BlockList")))
        .expect("start BlockList");
    for name in names {
        writer
            .write_event(Event::Start(BytesStart::new("Latest")))
            .expect("start Latest");
        writer
            .write_event(Event::Text(BytesText::new(name)))
            .expect("block name");
        writer
            .write_event(Event::End(BytesEnd::new("Latest")))
            .expect("end Latest");
    }
    writer
        .write_event(Event::End(BytesEnd::new("BlockList")))
        .expect("end BlockList");

    String::from_utf8(writer.into_inner().into_inner()).expect("valid utf-8")
}

/// Fetch and parse the uncommitted block list for a blob.
///
/// Fails with a 400-mapped error when the list contains no uncommitted
/// blocks: a commit was expected and there is nothing to commit.
pub async fn fetch_uncommitted_blocks(
    client: &reqwest::Client,
    blob_base_url: &str,
    query: &str,
) -> Result<Vec<String>, GatewayError> {
    let url = append_query(
        &format!("{}?comp=blocklist&blocklisttype=all", blob_base_url),
        query,
    );
    debug!("Fetching block list: {}", url);

    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Block list request failed: {}", e))?;

    if !resp.status().is_success() {
        return Err(GatewayError::UpstreamFailure {
            context: "Failed to get block list",
            status: resp.status().as_u16(),
            url,
        });
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| anyhow::anyhow!("Block list body read failed: {}", e))?;

    let names = parse_uncommitted_block_names(&body)?;
    if names.is_empty() {
        return Err(GatewayError::NoUncommittedBlocks);
    }

    Ok(names)
}

/// Issue the Put Block List commit that promotes the blob to committed.
///
/// Not idempotent-safe against concurrent duplicate invocation: two
/// requests racing here both reissue the PUT, and the storage service's
/// own last-write-wins serialization resolves it. The gateway adds no
/// coordination.
pub async fn commit_block_list(
    client: &reqwest::Client,
    blob_base_url: &str,
    query: &str,
    names: &[String],
) -> Result<(), GatewayError> {
    let url = append_query(&format!("{}?comp=blocklist", blob_base_url), query);
    let body = render_commit_block_list(names);
    debug!("Committing {} blocks: {}", names.len(), url);

    let resp = client
        .put(&url)
        .header("x-ms-blob-content-type", BLOB_CONTENT_TYPE)
        .header(crate::probe::META_STATE_HEADER, "committed")
        .header("Content-Type", "application/xml")
        .body(body)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Block commit request failed: {}", e))?;

    if !resp.status().is_success() {
        return Err(GatewayError::UpstreamFailure {
            context: "Failed to commit blocks",
            status: resp.status().as_u16(),
            url,
        });
    }

    Ok(())
}

// -- Tests --------------------------------------------------------------------
