//! Page computation in the raw and virtual cursor spaces.

use super::{
    build_record, Cursor, HarvestFilter, HitCounts, MetadataFormat, PageWindow, RecordPage,
};
use crate::index::QueryError;

/// Compute one page of records for a format.
///
/// Plain formats advance both cursors by the number of documents fetched.
/// Versioned formats advance the virtual cursor by records emitted and the
/// raw cursor only past documents whose versions were all emitted.
pub(super) fn list_page<F: MetadataFormat + ?Sized>(
    format: &F,
    filter: &HarvestFilter,
    window: PageWindow,
    with_metadata: bool,
) -> Result<RecordPage, QueryError> {
    match format.version_field() {
        None => plain_page(format, filter, window, with_metadata),
        Some(field) => versioned_page(format, filter, window, field, with_metadata),
    }
}

fn plain_page<F: MetadataFormat + ?Sized>(
    format: &F,
    filter: &HarvestFilter,
    window: PageWindow,
    with_metadata: bool,
) -> Result<RecordPage, QueryError> {
    let query = format.document_query(filter);
    let page = format
        .context()
        .index
        .list_documents(&query, window.cursor.raw_row, window.page_size)?;

    let consumed = page.documents.len() as u64;
    let records = page
        .documents
        .iter()
        .filter_map(|d| build_record(format, d, None, with_metadata))
        .collect();

    Ok(RecordPage {
        records,
        hits: HitCounts {
            virtual_hits: page.total_hits,
            raw_hits: page.total_hits,
        },
        next: Cursor {
            virtual_row: window.cursor.virtual_row + consumed,
            raw_row: window.cursor.raw_row + consumed,
            version_offset: 0,
        },
    })
}

fn versioned_page<F: MetadataFormat + ?Sized>(
    format: &F,
    filter: &HarvestFilter,
    window: PageWindow,
    field: &str,
    with_metadata: bool,
) -> Result<RecordPage, QueryError> {
    let index = &format.context().index;
    let query = format.document_query(filter);

    // Every matching document has at least one version, so page_size
    // documents always cover page_size records.
    let page = index.list_documents(&query, window.cursor.raw_row, window.page_size)?;
    let virtual_hits = match window.known_hits {
        Some(hits) => hits.virtual_hits,
        None => index.count_values(&query, field)?,
    };

    let mut records = Vec::new();
    let mut emitted: u64 = 0;
    let mut raw_row = window.cursor.raw_row;
    let mut offset = window.cursor.version_offset;

    'documents: for document in &page.documents {
        let versions = document.values(field);
        while let Some(version) = usize::try_from(offset).ok().and_then(|i| versions.get(i)) {
            if emitted == window.page_size {
                break 'documents;
            }
            records.extend(build_record(
                format,
                document,
                Some(version.as_str()),
                with_metadata,
            ));
            emitted += 1;
            offset += 1;
        }
        raw_row += 1;
        offset = 0;
    }

    Ok(RecordPage {
        records,
        hits: HitCounts {
            virtual_hits,
            raw_hits: page.total_hits,
        },
        next: Cursor {
            virtual_row: window.cursor.virtual_row + emitted,
            raw_row,
            version_offset: offset,
        },
    })
}
