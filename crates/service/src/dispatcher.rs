//! JSON-lines request loop: one request per stdin line, one response per stdout line.
//!
//! Every per-request failure is turned into a response here; nothing a
//! client sends can terminate the loop except closing stdin.

use std::time::Duration;

use anyhow::Result;
use core_types::{GalleryEntry, SessionKey};
use ipc::{EntryWire, Request, Response, framing};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::bootstrap::HomeMatch;
use crate::error::SearchError;
use crate::status::make_status_response;

const MAX_LINE_BYTES: usize = 64 * 1024;

/// Handle one decoded request.
pub async fn handle(app: &HomeMatch, req: Request) -> Response {
    match req {
        Request::Search(search) => {
            let session = search.session.unwrap_or_else(SessionKey::generate);
            let prefs = search.preferences();
            match app.search(session, &prefs).await {
                Ok(outcome) => Response::SearchResults {
                    session,
                    sequence: outcome.sequence,
                    entries: outcome.entries.iter().map(EntryWire::from).collect(),
                },
                Err(err) => failed_search(session, &err),
            }
        }
        Request::Select(select) => Response::Description {
            session: select.session,
            text: app.select(select.session, select.event()),
        },
        Request::EndSession { session } => Response::SessionEnded {
            session,
            existed: app.end_session(session),
        },
        Request::Status => Response::Status(make_status_response(app)),
    }
}

/// A failed search still renders one entry: the "try again" sentinel.
fn failed_search(session: SessionKey, err: &SearchError) -> Response {
    let sequence = match err {
        SearchError::Superseded { sequence } => {
            debug!(session = %session, sequence, "search superseded by a newer one");
            *sequence
        }
        SearchError::ServiceUnavailable(_) => {
            warn!(session = %session, error = %err, "search failed");
            0
        }
    };
    Response::SearchResults {
        session,
        sequence,
        entries: vec![EntryWire::from(&GalleryEntry::Unavailable)],
    }
}

/// Decode, handle and encode a single protocol line.
pub async fn dispatch_line(app: &HomeMatch, line: &str) -> String {
    if line.len() > MAX_LINE_BYTES {
        return framing::encode_response(&Response::error(format!(
            "request exceeds {MAX_LINE_BYTES} bytes"
        )));
    }
    let resp = match framing::decode_request(line) {
        Ok(req) => handle(app, req).await,
        Err(err) => {
            debug!(error = %err, "rejecting malformed request line");
            Response::error(format!("malformed request: {err}"))
        }
    };
    framing::encode_response(&resp)
}

/// Serve requests until `input` reaches EOF, sweeping idle sessions on an interval.
pub async fn serve<R, W>(app: &HomeMatch, input: R, mut output: W, sweep_every: Duration) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    let mut sweep = tokio::time::interval(sweep_every.max(Duration::from_secs(1)));
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let mut reply = dispatch_line(app, &line).await;
                reply.push('\n');
                output.write_all(reply.as_bytes()).await?;
                output.flush().await?;
            }
            _ = sweep.tick() => {
                let evicted = app.evict_idle_sessions();
                if evicted > 0 {
                    debug!(evicted, "swept idle sessions");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use catalog::ListingCatalog;
    use core_types::{ListingId, ListingRecord};
    use core_types::config::AppConfig;
    use semantic_index::{FlatIndex, HashEmbedder};

    const DESCRIPTIONS: [&str; 3] = [
        "Sunny two bedroom condo near the park",
        "Spacious family house with a large garden",
        "Modern loft downtown with rooftop deck",
    ];

    fn app() -> HomeMatch {
        let records: Vec<ListingRecord> = DESCRIPTIONS
            .iter()
            .enumerate()
            .map(|(i, d)| ListingRecord::new(ListingId::from(i as u64 + 1), *d))
            .collect();
        let catalog = ListingCatalog::from_records(records).expect("catalog");
        let index = FlatIndex::from_texts(
            Arc::new(HashEmbedder::new(64)),
            catalog.records().map(|r| (r.id.clone(), r.description.as_str())),
        )
        .expect("index");
        HomeMatch::from_parts(&AppConfig::default(), Arc::new(catalog), Arc::new(index))
            .expect("engine")
    }

    fn decode(line: &str) -> Response {
        serde_json::from_str(line).expect("response json")
    }

    #[tokio::test]
    async fn malformed_line_yields_error_response() {
        let app = app();
        let resp = decode(&dispatch_line(&app, "{not json").await);
        assert!(matches!(resp, Response::Error { message } if message.starts_with("malformed request")));
    }

    #[tokio::test]
    async fn search_then_select_uses_assigned_session() {
        let app = app();
        let line = r#"{"type":"search","budget":"500000","bedrooms":"2","features":"park, condo"}"#;
        let Response::SearchResults { session, entries, sequence } =
            decode(&dispatch_line(&app, line).await)
        else {
            panic!("expected search results");
        };
        assert_eq!(sequence, 1);
        assert_eq!(entries.len(), DESCRIPTIONS.len());
        assert!(entries.iter().all(|e| e.listing_id.is_some()));

        let select = format!(r#"{{"type":"select","session":"{session}","index":0}}"#);
        let Response::Description { text, .. } = decode(&dispatch_line(&app, &select).await) else {
            panic!("expected description");
        };
        assert!(DESCRIPTIONS.contains(&text.as_str()));

        let out_of_range = format!(r#"{{"type":"select","session":"{session}","index":7}}"#);
        let Response::Description { text, .. } = decode(&dispatch_line(&app, &out_of_range).await)
        else {
            panic!("expected description");
        };
        assert!(text.starts_with(crate::SELECTION_ERROR_PREFIX));
    }

    #[test]
    fn superseded_search_still_renders_a_sentinel() {
        let session = SessionKey::generate();
        let Response::SearchResults { sequence, entries, .. } =
            failed_search(session, &SearchError::Superseded { sequence: 4 })
        else {
            panic!("expected search results");
        };
        assert_eq!(sequence, 4);
        assert_eq!(entries, vec![EntryWire::from(&GalleryEntry::Unavailable)]);

        let Response::SearchResults { entries, .. } =
            failed_search(session, &SearchError::ServiceUnavailable("down".into()))
        else {
            panic!("expected search results");
        };
        assert_eq!(entries.len(), 1);
        assert!(entries[0].placeholder_asset);
    }

    #[tokio::test]
    async fn end_session_reports_whether_it_existed() {
        let app = app();
        let session = SessionKey::generate();
        let resp = handle(&app, Request::EndSession { session }).await;
        assert_eq!(resp, Response::SessionEnded { session, existed: false });
    }

    #[tokio::test]
    async fn status_reports_catalog_and_index() {
        let app = app();
        let Response::Status(status) = handle(&app, Request::Status).await else {
            panic!("expected status");
        };
        assert_eq!(status.listings, 3);
        assert_eq!(status.vectors, 3);
        assert_eq!(status.dimension, 64);
        assert_eq!(status.sessions, 0);
    }

    #[tokio::test]
    async fn serve_answers_each_non_blank_line() {
        let app = app();
        let input = b"{\"type\":\"status\"}\n\n{\"type\":\"bogus\"}\n".as_slice();
        let mut output = Vec::new();
        serve(&app, input, &mut output, Duration::from_secs(60))
            .await
            .expect("serve");
        let text = String::from_utf8(output).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(matches!(decode(lines[0]), Response::Status(_)));
        assert!(matches!(decode(lines[1]), Response::Error { .. }));
    }
}
