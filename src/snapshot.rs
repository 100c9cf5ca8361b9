//! A [`Gateway`] over a fixed set of documents, for offline builds and
//! tests. A snapshot answers queries the way the CMS does: predicates,
//! orderings, the `after` cursor, field selection and pagination.

use crate::document::parse_timestamp;
use crate::gateway::{
    Direction, Error, Gateway, GetOptions, OrderBy, Predicate, QueryOptions,
    QueryResponse, RawDocument, Result,
};
use std::cmp::Ordering;
use std::fs::File;
use std::path::Path;
use walkdir::WalkDir;

/// The page size used when a query doesn't ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

const JSON_EXTENSION: &str = "json";

/// Serves queries from documents held in memory.
pub struct SnapshotGateway {
    documents: Vec<RawDocument>,
}

impl SnapshotGateway {
    /// Constructs a snapshot. Without an explicit ordering, queries return
    /// documents in the order given here.
    pub fn new(documents: Vec<RawDocument>) -> SnapshotGateway {
        SnapshotGateway { documents }
    }

    /// Loads every `*.json` file under `dir`, in file-name order. A file
    /// holds either one document or a list of documents.
    pub fn from_directory(dir: &Path) -> Result<SnapshotGateway> {
        let mut documents = Vec::new();
        for result in WalkDir::new(dir).sort_by_file_name() {
            let entry = result?;
            let is_json = entry.path().extension().map_or(false, |ext| {
                ext == JSON_EXTENSION
            });
            if !entry.file_type().is_file() || !is_json {
                continue;
            }

            let value: serde_json::Value =
                serde_json::from_reader(File::open(entry.path())?).map_err(
                    |err| Error::Decode {
                        path: entry.path().to_owned(),
                        err,
                    },
                )?;
            let decoded: serde_json::Result<Vec<RawDocument>> = match value {
                serde_json::Value::Array(_) => serde_json::from_value(value),
                _ => serde_json::from_value(value).map(|doc| vec![doc]),
            };
            documents.extend(decoded.map_err(|err| Error::Decode {
                path: entry.path().to_owned(),
                err,
            })?);
        }
        tracing::info!(
            directory = %dir.display(),
            documents = documents.len(),
            "loaded snapshot"
        );
        Ok(SnapshotGateway::new(documents))
    }
}

impl Gateway for SnapshotGateway {
    fn query(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<QueryResponse> {
        if let Some(reference) = &options.reference {
            tracing::debug!(
                reference = %reference,
                "snapshot ignores content refs"
            );
        }

        let mut matched: Vec<&RawDocument> = self
            .documents
            .iter()
            .filter(|doc| predicates.iter().all(|p| p.matches(doc)))
            .collect();

        if let Some(order) = &options.orderings {
            // stable, so ties keep snapshot order
            matched.sort_by(|a, b| compare(order, a, b));
        }

        if let Some(after) = &options.after {
            if let Some(i) = matched.iter().position(|doc| &doc.id == after) {
                matched = matched.split_off(i + 1);
            }
        }

        let page_size = options.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let page = options.page.unwrap_or(1).max(1);
        let total_pages = (matched.len() + page_size - 1) / page_size;

        let results = matched
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .map(|doc| select(doc, &options.fetch))
            .collect();

        Ok(QueryResponse {
            page,
            total_pages,
            results,
            next_page: match page < total_pages {
                true => Some(format!("snapshot:?page={}", page + 1)),
                false => None,
            },
        })
    }

    fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
        _options: &GetOptions,
    ) -> Result<RawDocument> {
        self.documents
            .iter()
            .find(|doc| {
                doc.document_type == document_type
                    && doc.uid.as_deref() == Some(uid)
            })
            .cloned()
            .ok_or_else(|| Error::NotFound {
                document_type: document_type.to_owned(),
                uid: uid.to_owned(),
            })
    }
}

/// Orders two documents by a timestamp field. Documents without the
/// timestamp sort after those with one, whatever the direction.
fn compare(order: &OrderBy, a: &RawDocument, b: &RawDocument) -> Ordering {
    let key = |doc: &RawDocument| order.field.of(doc).and_then(parse_timestamp);
    match (key(a), key(b)) {
        (Some(a), Some(b)) => match order.direction {
            Direction::Asc => a.cmp(&b),
            Direction::Desc => b.cmp(&a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Applies a `fetch` list (`{type}.{field}` entries) to a document's data.
fn select(doc: &RawDocument, fetch: &[String]) -> RawDocument {
    let mut doc = doc.clone();
    if !fetch.is_empty() {
        let prefix = format!("{}.", doc.document_type);
        let wanted: Vec<&str> = fetch
            .iter()
            .filter_map(|f| f.strip_prefix(prefix.as_str()))
            .collect();
        doc.data.retain(|field, _| wanted.contains(&field.as_str()));
    }
    doc
}
