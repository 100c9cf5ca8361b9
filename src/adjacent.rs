//! Resolves the posts linked from a post page's previous/next navigation.
//!
//! Each side is found with its own query: page size 1, starting after the
//! current post, in that side's [`OrderBy`]. The orderings are configuration
//! ([`Adjacency`]); the defaults keep the historical behavior of ordering
//! "previous" by first publication and "next" by last publication
//! (descending), which is probably not intended but hasn't been confirmed.

use crate::document::{required_text, slug};
use crate::error::Result;
use crate::gateway::{
    Gateway, OrderBy, OrderingField, Predicate, QueryOptions, RawDocument,
    POSTS_TYPE,
};
use serde::Deserialize;

/// The orderings used to find a post's neighbours.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct Adjacency {
    pub previous: OrderBy,
    pub next: OrderBy,
}

impl Default for Adjacency {
    fn default() -> Self {
        Adjacency {
            previous: OrderBy::asc(OrderingField::FirstPublicationDate),
            next: OrderBy::desc(OrderingField::LastPublicationDate),
        }
    }
}

/// A link to another post.
#[derive(Clone, Debug, PartialEq)]
pub struct PostRef {
    pub slug: String,
    pub title: String,
}

impl PostRef {
    pub fn from_document(doc: &RawDocument) -> Result<PostRef> {
        Ok(PostRef {
            slug: slug(doc)?,
            title: required_text(doc, "title")?,
        })
    }
}

/// The neighbours of a post. Either side may be missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdjacentPosts {
    pub previous: Option<PostRef>,
    pub next: Option<PostRef>,
}

/// Finds the neighbours of the post with id `current_id`. The two lookups
/// are independent and run concurrently. The current post is never returned
/// as its own neighbour.
pub fn resolve(
    gateway: &dyn Gateway,
    current_id: &str,
    adjacency: &Adjacency,
    reference: Option<&str>,
) -> Result<AdjacentPosts> {
    std::thread::scope(|scope| {
        let previous = scope.spawn(|| {
            neighbour(gateway, current_id, adjacency.previous, reference)
        });
        let next = neighbour(gateway, current_id, adjacency.next, reference);
        let previous = match previous.join() {
            Ok(previous) => previous,
            Err(panic) => std::panic::resume_unwind(panic),
        };
        Ok(AdjacentPosts {
            previous: previous?,
            next: next?,
        })
    })
}

fn neighbour(
    gateway: &dyn Gateway,
    current_id: &str,
    order: OrderBy,
    reference: Option<&str>,
) -> Result<Option<PostRef>> {
    tracing::debug!(
        current = current_id,
        order = %order,
        "looking up neighbour"
    );
    let response = gateway.query(
        &[Predicate::document_type(POSTS_TYPE)],
        &QueryOptions {
            fetch: vec![format!("{}.title", POSTS_TYPE)],
            page_size: Some(1),
            after: Some(current_id.to_owned()),
            orderings: Some(order),
            reference: reference.map(str::to_owned),
            ..QueryOptions::default()
        },
    )?;

    // A malformed neighbour is that post's problem; this page just loses
    // the link.
    match response.results.iter().find(|doc| doc.id != current_id) {
        Some(doc) => match PostRef::from_document(doc) {
            Ok(post) => Ok(Some(post)),
            Err(err) => {
                tracing::warn!(
                    current = current_id,
                    neighbour = %doc.id,
                    error = %err,
                    "skipping malformed neighbour"
                );
                Ok(None)
            }
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gateway::{
        Direction, Error as GatewayError, GetOptions, QueryResponse,
    };
    use crate::snapshot::SnapshotGateway;
    use serde_json::json;
    use std::sync::Mutex;

    fn post(id: &str, first: &str, last: &str) -> RawDocument {
        serde_json::from_value(json!({
            "id": id,
            "uid": format!("post-{}", id),
            "type": "posts",
            "first_publication_date": first,
            "last_publication_date": last,
            "data": {
                "title": format!("Post {}", id),
                "author": "A",
                "content": []
            }
        }))
        .unwrap()
    }

    fn chronological() -> SnapshotGateway {
        SnapshotGateway::new(vec![
            post("b", "2021-02-01T00:00:00+0000", "2021-02-01T00:00:00+0000"),
            post("a", "2021-01-01T00:00:00+0000", "2021-01-01T00:00:00+0000"),
            post("c", "2021-03-01T00:00:00+0000", "2021-03-01T00:00:00+0000"),
        ])
    }

    fn symmetric() -> Adjacency {
        Adjacency {
            previous: OrderBy::desc(OrderingField::FirstPublicationDate),
            next: OrderBy::asc(OrderingField::FirstPublicationDate),
        }
    }

    fn slugs(adjacent: &AdjacentPosts) -> (Option<&str>, Option<&str>) {
        (
            adjacent.previous.as_ref().map(|p| p.slug.as_str()),
            adjacent.next.as_ref().map(|p| p.slug.as_str()),
        )
    }

    #[test]
    fn test_middle_post_has_both_neighbours() -> Result<()> {
        let adjacent = resolve(&chronological(), "b", &symmetric(), None)?;
        assert_eq!((Some("post-a"), Some("post-c")), slugs(&adjacent));
        assert_eq!("Post a", adjacent.previous.unwrap().title);
        Ok(())
    }

    #[test]
    fn test_ends_have_one_neighbour() -> Result<()> {
        let gateway = chronological();
        assert_eq!(
            (None, Some("post-b")),
            slugs(&resolve(&gateway, "a", &symmetric(), None)?)
        );
        assert_eq!(
            (Some("post-b"), None),
            slugs(&resolve(&gateway, "c", &symmetric(), None)?)
        );
        Ok(())
    }

    #[test]
    fn test_only_post_has_no_neighbours() -> Result<()> {
        let gateway = SnapshotGateway::new(vec![post(
            "solo",
            "2021-01-01T00:00:00+0000",
            "2021-01-01T00:00:00+0000",
        )]);
        for adjacency in &[Adjacency::default(), symmetric()] {
            assert_eq!(
                AdjacentPosts::default(),
                resolve(&gateway, "solo", adjacency, None)?
            );
        }
        Ok(())
    }

    #[test]
    fn test_default_orderings_are_kept() -> Result<()> {
        // "previous" walks forward by first publication and "next" walks
        // backward by last publication, so an edit can reorder "next".
        let gateway = SnapshotGateway::new(vec![
            post("a", "2021-01-01T00:00:00+0000", "2021-06-01T00:00:00+0000"),
            post("b", "2021-02-01T00:00:00+0000", "2021-02-01T00:00:00+0000"),
            post("c", "2021-03-01T00:00:00+0000", "2021-03-01T00:00:00+0000"),
        ]);
        let adjacent = resolve(&gateway, "b", &Adjacency::default(), None)?;
        assert_eq!((Some("post-c"), None), slugs(&adjacent));
        Ok(())
    }

    #[test]
    fn test_malformed_neighbour_is_skipped() -> Result<()> {
        let mut untitled =
            post("c", "2021-03-01T00:00:00+0000", "2021-03-01T00:00:00+0000");
        untitled.data.remove("title");
        let mut escaping =
            post("a", "2021-01-01T00:00:00+0000", "2021-01-01T00:00:00+0000");
        escaping.uid = Some(String::from("../a"));
        let gateway = SnapshotGateway::new(vec![
            escaping,
            post("b", "2021-02-01T00:00:00+0000", "2021-02-01T00:00:00+0000"),
            untitled,
        ]);
        assert_eq!(
            AdjacentPosts::default(),
            resolve(&gateway, "b", &symmetric(), None)?
        );
        Ok(())
    }

    /// A gateway that always answers with the current post, as a
    /// misbehaving cursor would.
    struct Echo;

    impl Gateway for Echo {
        fn query(
            &self,
            _: &[Predicate],
            options: &QueryOptions,
        ) -> crate::gateway::Result<QueryResponse> {
            let id = options.after.clone().unwrap();
            Ok(QueryResponse {
                page: 1,
                total_pages: 1,
                results: vec![post(
                    &id,
                    "2021-01-01T00:00:00Z",
                    "2021-01-01T00:00:00Z",
                )],
                next_page: None,
            })
        }

        fn get_by_uid(
            &self,
            document_type: &str,
            uid: &str,
            _: &GetOptions,
        ) -> crate::gateway::Result<RawDocument> {
            Err(GatewayError::NotFound {
                document_type: document_type.to_owned(),
                uid: uid.to_owned(),
            })
        }
    }

    #[test]
    fn test_never_returns_current_post() -> Result<()> {
        assert_eq!(
            AdjacentPosts::default(),
            resolve(&Echo, "x", &Adjacency::default(), None)?
        );
        Ok(())
    }

    /// Records the options of every query.
    struct Recorder(Mutex<Vec<QueryOptions>>);

    impl Gateway for Recorder {
        fn query(
            &self,
            _: &[Predicate],
            options: &QueryOptions,
        ) -> crate::gateway::Result<QueryResponse> {
            self.0.lock().unwrap().push(options.clone());
            Ok(QueryResponse {
                page: 1,
                total_pages: 0,
                results: Vec::new(),
                next_page: None,
            })
        }

        fn get_by_uid(
            &self,
            document_type: &str,
            uid: &str,
            _: &GetOptions,
        ) -> crate::gateway::Result<RawDocument> {
            Err(GatewayError::NotFound {
                document_type: document_type.to_owned(),
                uid: uid.to_owned(),
            })
        }
    }

    #[test]
    fn test_query_shape() -> Result<()> {
        let recorder = Recorder(Mutex::new(Vec::new()));
        resolve(&recorder, "YEX1", &Adjacency::default(), Some("preview-ref"))?;
        let mut queries = recorder.0.into_inner().unwrap();
        queries.sort_by_key(|q| q.orderings.map(|o| o.to_string()));
        assert_eq!(2, queries.len());
        for q in &queries {
            assert_eq!(Some(1), q.page_size);
            assert_eq!(Some("YEX1".to_owned()), q.after);
            assert_eq!(Some("preview-ref".to_owned()), q.reference);
        }
        assert_eq!(
            Some(OrderBy::asc(OrderingField::FirstPublicationDate)),
            queries[0].orderings
        );
        assert_eq!(
            Some(OrderBy {
                field: OrderingField::LastPublicationDate,
                direction: Direction::Desc,
            }),
            queries[1].orderings
        );
        Ok(())
    }
}
