//! A [`Gateway`] backed by a Prismic repository's REST API (v2).

use crate::gateway::{
    Error, Gateway, GetOptions, Predicate, QueryOptions, QueryResponse,
    RawDocument, Result,
};
use serde::Deserialize;
use std::time::Duration;
use ureq::Agent;
use url::Url;

/// How long a single API call may take, connection included.
const TIMEOUT: Duration = Duration::from_secs(30);

/// Queries a Prismic repository over HTTP.
pub struct PrismicGateway {
    agent: Agent,

    /// The repository's API entry point, e.g.,
    /// `https://spacetravelling.cdn.prismic.io/api/v2`.
    endpoint: Url,

    access_token: Option<String>,

    /// The ref of the published content, used unless a query asks for
    /// another one (e.g., a preview).
    master_ref: String,
}

#[derive(Deserialize)]
struct Api {
    refs: Vec<ApiRef>,
}

#[derive(Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,

    #[serde(default, rename = "isMasterRef")]
    is_master_ref: bool,
}

impl PrismicGateway {
    /// Connects to the repository at `endpoint`, looking up its master ref.
    pub fn connect(
        endpoint: &Url,
        access_token: Option<&str>,
    ) -> Result<PrismicGateway> {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .build()
            .into();

        let mut request = agent.get(endpoint.as_str());
        if let Some(token) = access_token {
            request = request.query("access_token", token);
        }
        let api: Api = request.call()?.body_mut().read_json()?;
        let master_ref = api
            .refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .ok_or(Error::NoMasterRef)?
            .reference;

        tracing::info!(endpoint = %endpoint, "connected to repository");
        Ok(PrismicGateway {
            agent,
            endpoint: endpoint.clone(),
            access_token: access_token.map(str::to_owned),
            master_ref,
        })
    }

    fn search_url(&self) -> Result<Url> {
        // `join` would replace the last path segment without the slash
        let base = format!("{}/", self.endpoint.as_str().trim_end_matches('/'));
        Ok(Url::parse(&base)?.join("documents/search")?)
    }
}

/// Renders predicates as the `q` parameter, e.g.,
/// `[[at(document.type, "posts")]]`.
fn query_param(predicates: &[Predicate]) -> String {
    let mut q = String::from("[");
    for predicate in predicates {
        q.push_str(&predicate.to_string());
    }
    q.push(']');
    q
}

impl Gateway for PrismicGateway {
    fn query(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<QueryResponse> {
        let reference =
            options.reference.as_deref().unwrap_or(&self.master_ref);
        let q = query_param(predicates);
        tracing::debug!(q = %q, reference = reference, "querying repository");

        let url = self.search_url()?;
        let mut request = self
            .agent
            .get(url.as_str())
            .query("ref", reference)
            .query("q", &q);
        if !options.fetch.is_empty() {
            request = request.query("fetch", &options.fetch.join(","));
        }
        if let Some(page_size) = options.page_size {
            request = request.query("pageSize", &page_size.to_string());
        }
        if let Some(page) = options.page {
            request = request.query("page", &page.to_string());
        }
        if let Some(after) = &options.after {
            request = request.query("after", after);
        }
        if let Some(orderings) = &options.orderings {
            request = request.query("orderings", &orderings.to_string());
        }
        if let Some(token) = &self.access_token {
            request = request.query("access_token", token);
        }

        Ok(request.call()?.body_mut().read_json()?)
    }

    fn get_by_uid(
        &self,
        document_type: &str,
        uid: &str,
        options: &GetOptions,
    ) -> Result<RawDocument> {
        let response = self.query(
            &[Predicate::at(&format!("my.{}.uid", document_type), uid)],
            &QueryOptions {
                page_size: Some(1),
                reference: options.reference.clone(),
                ..QueryOptions::default()
            },
        )?;
        response.results.into_iter().next().ok_or_else(|| Error::NotFound {
            document_type: document_type.to_owned(),
            uid: uid.to_owned(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gateway::POSTS_TYPE;

    #[test]
    fn test_query_param() {
        assert_eq!(
            r#"[[at(document.type, "posts")][at(my.posts.uid, "hello")]]"#,
            query_param(&[
                Predicate::document_type(POSTS_TYPE),
                Predicate::at("my.posts.uid", "hello"),
            ])
        );
        assert_eq!("[]", query_param(&[]));
    }

    #[test]
    fn test_search_response_shape() {
        let response: QueryResponse = serde_json::from_str(
            r#"{
                "page": 1,
                "results_per_page": 1,
                "results_size": 1,
                "total_results_size": 2,
                "total_pages": 2,
                "next_page": "https://st.cdn.prismic.io/api/v2/search?page=2",
                "prev_page": null,
                "results": [{
                    "id": "YEX1",
                    "uid": "como-utilizar-hooks",
                    "type": "posts",
                    "href": "https://st.cdn.prismic.io/api/v2/search?ref=YG",
                    "tags": [],
                    "first_publication_date": "2021-03-15T19:25:28+0000",
                    "last_publication_date": "2021-03-25T19:27:35+0000",
                    "slugs": ["como-utilizar-hooks"],
                    "linked_documents": [],
                    "lang": "pt-br",
                    "alternate_languages": [],
                    "data": { "title": "Como utilizar Hooks" }
                }],
                "version": "8d7b3a5",
                "license": "All Rights Reserved"
            }"#,
        )
        .unwrap();
        assert_eq!(2, response.total_pages);
        assert!(response.next_page.is_some());
        assert_eq!(
            Some("como-utilizar-hooks"),
            response.results[0].uid.as_deref()
        );
    }

    #[test]
    fn test_api_refs() {
        let api: Api = serde_json::from_str(
            r#"{ "refs": [
                { "id": "preview", "ref": "YH-preview", "label": "Release" },
                {
                    "id": "master",
                    "ref": "YG-master",
                    "label": "Master",
                    "isMasterRef": true
                }
            ] }"#,
        )
        .unwrap();
        let master = api.refs.into_iter().find(|r| r.is_master_ref).unwrap();
        assert_eq!("YG-master", master.reference);
    }
}
