//! The library code for `spacetravelling`, a blog whose posts live in a
//! Prismic repository. The architecture can be broken down into three steps:
//!
//! 1. Querying documents from the CMS through a [`gateway::Gateway`], either
//!    the repository's REST API ([`prismic`]) or a local snapshot
//!    ([`snapshot`])
//! 2. Turning the raw documents into display-ready view data ([`view`])
//! 3. Templating the views into pages ([`site`], [`write`]) and writing them
//!    to disk ([`build`])
//!
//! The second step is the interesting one. A document is first validated and
//! mapped into a typed post ([`document`]). From the post we derive the
//! formatted publication and edit dates ([`date`]), a reading-time estimate
//! ([`metrics`]), the body markup ([`richtext`]) and the links to the
//! neighbouring posts ([`adjacent`]).
//!
//! Pages are always rendered from an explicit [`view::RenderState`], and the
//! preview mode travels with each request in a [`view::RequestContext`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod adjacent;
pub mod build;
pub mod config;
pub mod date;
pub mod document;
pub mod error;
pub mod gateway;
pub mod link;
pub mod metrics;
pub mod prismic;
pub mod richtext;
pub mod routes;
pub mod site;
pub mod snapshot;
pub mod value;
pub mod view;
pub mod write;
