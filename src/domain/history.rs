use crate::domain::models::HistoryEntry;

/// What one history request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryPage {
    Entries(Vec<HistoryEntry>),
    Rejected { status: u16, body: String },
    Malformed { reason: String },
}

pub trait HistoryPageSource {
    type Error;

    fn fetch_page(
        &mut self,
        fingerprint: &str,
        offset_id: i64,
    ) -> Result<HistoryPage, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationEnd {
    Exhausted,
    NoStartCursor,
    Rejected { status: u16 },
    Malformed,
    MissingCursor,
    CursorNotDecreasing { cursor: i64, next: i64 },
}

impl PaginationEnd {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedHistory {
    pub entries: Vec<HistoryEntry>,
    pub end: PaginationEnd,
    pub pages: usize,
}

/// Walks a device's history backwards from `start_cursor` until the service
/// returns an empty page.
///
/// Rejected or unparsable pages stop the walk and keep what was already
/// collected. Only errors from the page source itself are returned.
pub fn fetch_history<S>(
    source: &mut S,
    fingerprint: &str,
    start_cursor: Option<i64>,
) -> Result<FetchedHistory, S::Error>
where
    S: HistoryPageSource,
{
    let mut entries = Vec::new();
    let mut pages = 0_usize;

    let Some(mut cursor) = start_cursor else {
        tracing::warn!(fingerprint, "device has neither maxId nor minId, skipping history");
        return Ok(FetchedHistory {
            entries,
            end: PaginationEnd::NoStartCursor,
            pages,
        });
    };

    let end = loop {
        tracing::debug!(fingerprint, offset_id = cursor, "requesting history page");

        let page = match source.fetch_page(fingerprint, cursor)? {
            HistoryPage::Entries(page) => page,
            HistoryPage::Rejected { status, body } => {
                tracing::warn!(
                    fingerprint,
                    offset_id = cursor,
                    status,
                    body = %body,
                    "history request rejected"
                );
                break PaginationEnd::Rejected { status };
            }
            HistoryPage::Malformed { reason } => {
                tracing::warn!(
                    fingerprint,
                    offset_id = cursor,
                    reason = %reason,
                    "history page could not be parsed"
                );
                break PaginationEnd::Malformed;
            }
        };

        if page.is_empty() {
            break PaginationEnd::Exhausted;
        }
        pages += 1;

        let next = page
            .last()
            .and_then(|last| last.id().or_else(|| last.offset_id()))
            .and_then(|last_id| last_id.checked_sub(1));
        entries.extend(page);

        let Some(next) = next else {
            tracing::warn!(
                fingerprint,
                offset_id = cursor,
                "last history entry has no usable id or offsetId"
            );
            break PaginationEnd::MissingCursor;
        };

        if next >= cursor {
            tracing::warn!(fingerprint, cursor, next, "history cursor did not move backwards");
            break PaginationEnd::CursorNotDecreasing { cursor, next };
        }

        cursor = next;
    };

    Ok(FetchedHistory {
        entries,
        end,
        pages,
    })
}
