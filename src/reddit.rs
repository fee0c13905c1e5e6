//! Reddit listing provider.
//!
//! The walker only depends on the [`ListingProvider`] trait; [`RedditClient`]
//! implements it against Reddit's public JSON endpoints (`<path>.json`,
//! `raw_json=1` so URLs arrive unescaped).
//!
//! # Scopes
//!
//! | Scope | Endpoint | Output directory |
//! |-------|----------|------------------|
//! | Subreddit | `/r/<name>/<category>.json` | `r/<name>/<category>` |
//! | Multireddit | `/r/<a+b>/<category>.json` | `m/<a+b>/<category>` |
//! | Search | `/r/<a+b>/search.json?q=..` | `q/<query>/<a+b>/<sort>` |
//! | User | `/user/<name>/<category>.json` | `u/<name>/<category>/<sort>` |
//!
//! Pages hold up to 100 entries and are chained through the `after` cursor
//! until the listing ends or the requested limit is reached.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use itertools::Itertools;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::http::Fetcher;
use crate::models::{CommentNode, Entry, Listing, Submission, Thing, UserProfile, comment_nodes};
use crate::utils::sanitize_name;

/// Largest page Reddit serves.
const PAGE_SIZE: usize = 100;

/// Maximum characters of a joined multireddit name used as a directory.
const MAX_MULTI_NAME_CHARS: usize = 64;

/// Categories a subreddit or multireddit listing can be fetched by.
pub const SUBREDDIT_CATEGORIES: &[&str] = &["hot", "new", "rising", "controversial", "top", "gilded"];

/// Sort orders of a user's submitted/comments listings.
pub const USER_SORTS: &[&str] = &["hot", "new", "top", "controversial"];

/// Sort orders of a search.
pub const SEARCH_SORTS: &[&str] = &["relevance", "hot", "top", "new", "comments"];

/// Time filters of a search.
pub const TIME_FILTERS: &[&str] = &["all", "day", "hour", "month", "week", "year"];

/// Owning context of a listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    Subreddit(String),
    Multireddit(Vec<String>),
    Search {
        query: String,
        subreddits: Vec<String>,
        time_filter: String,
        include_nsfw: bool,
    },
    User(String),
}

/// One listing to walk: scope × category (× sort), optionally capped.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRequest {
    pub scope: Scope,
    /// `hot`, `top`, ... for subreddits; `submitted`/`comments` for users;
    /// `search` for searches.
    pub category: String,
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

fn joined(names: &[String]) -> String {
    names.iter().unique().join("+")
}

impl ListingRequest {
    /// Directory of this listing relative to the site root.
    pub fn relative_dir(&self) -> PathBuf {
        let mut dir = PathBuf::new();
        match &self.scope {
            Scope::Subreddit(name) => {
                dir.push("r");
                dir.push(name);
                dir.push(&self.category);
            }
            Scope::Multireddit(names) => {
                dir.push("m");
                dir.push(truncate_multi_name(&joined(names)));
                dir.push(&self.category);
            }
            Scope::Search {
                query, subreddits, ..
            } => {
                dir.push("q");
                dir.push(sanitize_name(query, MAX_MULTI_NAME_CHARS));
                dir.push(truncate_multi_name(&joined(subreddits)));
            }
            Scope::User(name) => {
                dir.push("u");
                dir.push(name);
                dir.push(&self.category);
            }
        }
        if let Some(sort) = &self.sort {
            dir.push(sort);
        }
        dir
    }

    /// Human-readable label for logs, e.g. `/r/rust/top`.
    pub fn label(&self) -> String {
        let base = match &self.scope {
            Scope::Subreddit(name) => format!("/r/{name}/{}", self.category),
            Scope::Multireddit(names) => format!("/m/{}/{}", joined(names), self.category),
            Scope::Search {
                query, subreddits, ..
            } => format!("/r/{}/search?q={query}", joined(subreddits)),
            Scope::User(name) => format!("/u/{name}/{}", self.category),
        };
        match &self.sort {
            Some(sort) => format!("{base} ({sort})"),
            None => base,
        }
    }

    /// Endpoint path and query parameters, without paging parameters.
    fn endpoint(&self) -> (String, Vec<(&'static str, String)>) {
        let mut params = Vec::new();
        let path = match &self.scope {
            Scope::Subreddit(name) => format!("/r/{name}/{}.json", self.category),
            Scope::Multireddit(names) => format!("/r/{}/{}.json", joined(names), self.category),
            Scope::Search {
                query,
                subreddits,
                time_filter,
                include_nsfw,
            } => {
                params.push(("q", query.clone()));
                params.push(("restrict_sr", "on".to_string()));
                params.push(("t", time_filter.clone()));
                if *include_nsfw {
                    params.push(("include_over_18", "on".to_string()));
                }
                format!("/r/{}/search.json", joined(subreddits))
            }
            Scope::User(name) => format!("/user/{name}/{}.json", self.category),
        };
        if let Some(sort) = &self.sort {
            params.push(("sort", sort.clone()));
        }
        let timed = matches!(self.category.as_str(), "top" | "controversial")
            || matches!(self.sort.as_deref(), Some("top" | "controversial"));
        if timed && !matches!(self.scope, Scope::Search { .. }) {
            params.push(("t", "all".to_string()));
        }
        (path, params)
    }
}

fn truncate_multi_name(name: &str) -> String {
    if name.chars().count() > MAX_MULTI_NAME_CHARS {
        let mut cut: String = name.chars().take(MAX_MULTI_NAME_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        name.to_string()
    }
}

/// Source of listings, comment forests and user profiles.
#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Lazily page through a listing. An `Err` item ends the listing.
    fn listing<'a>(&'a self, request: &'a ListingRequest) -> BoxStream<'a, Result<Entry>>;

    /// Comment forest of a submission. With `expand_budget = Some(n)` up to
    /// `n` collapsed placeholders are resolved before returning.
    async fn comment_forest(
        &self,
        submission: &Submission,
        expand_budget: Option<usize>,
    ) -> Result<Vec<CommentNode>>;

    /// Public profile of a user.
    async fn user_profile(&self, name: &str) -> Result<UserProfile>;
}

/// [`ListingProvider`] backed by Reddit's public JSON API.
#[derive(Debug, Clone)]
pub struct RedditClient {
    fetcher: Fetcher,
    base_url: Url,
}

struct Pager {
    after: Option<String>,
    remaining: Option<usize>,
    buffer: VecDeque<Entry>,
    exhausted: bool,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenResponse {
    json: MoreChildrenJson,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenJson {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    #[serde(default)]
    data: Option<MoreChildrenData>,
}

#[derive(Debug, Default, Deserialize)]
struct MoreChildrenData {
    #[serde(default)]
    things: Vec<Thing>,
}

impl RedditClient {
    pub fn new(fetcher: Fetcher, base_url: &str) -> Result<Self> {
        Ok(Self {
            fetcher,
            base_url: Url::parse(base_url)?,
        })
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let mut url = self.base_url.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("raw_json", "1");
        }
        Ok(url.to_string())
    }

    #[instrument(level = "debug", skip(self, request), fields(listing = %request.label()))]
    async fn fetch_page(
        &self,
        request: &ListingRequest,
        after: Option<&str>,
        page_size: usize,
    ) -> Result<(Vec<Entry>, Option<String>)> {
        let (path, mut params) = request.endpoint();
        params.push(("limit", page_size.to_string()));
        if let Some(after) = after {
            params.push(("after", after.to_string()));
        }
        let url = self.url(&path, &params)?;
        let listing: Listing = self.fetcher.get_json(&url, &HeaderMap::new()).await?;

        let next = listing.data.after.clone();
        let entries = listing.into_entries();
        debug!(count = entries.len(), next = ?next, "Fetched listing page");
        Ok((entries, next))
    }

    /// Resolve one batch of collapsed children into a nested forest.
    async fn more_children(&self, link_fullname: &str, children: &[String]) -> Result<Vec<CommentNode>> {
        let url = self.url(
            "/api/morechildren.json",
            &[
                ("api_type", "json".to_string()),
                ("link_id", link_fullname.to_string()),
                ("children", children.iter().join(",")),
            ],
        )?;
        let response: MoreChildrenResponse = self.fetcher.get_json(&url, &HeaderMap::new()).await?;
        if !response.json.errors.is_empty() {
            return Err(Error::Listing(format!(
                "morechildren rejected: {:?}",
                response.json.errors
            )));
        }
        Ok(comment_nodes(response.json.data.unwrap_or_default().things))
    }

    async fn expand_placeholders(
        &self,
        link_fullname: &str,
        forest: &mut Vec<CommentNode>,
        mut budget: usize,
    ) {
        while budget > 0 {
            let Some(path) = first_expandable(forest) else {
                break;
            };
            let Some((container, index)) = container_at(forest, &path) else {
                break;
            };
            let CommentNode::More(more) = container.remove(index) else {
                break;
            };
            budget -= 1;
            match self.more_children(link_fullname, &more.children).await {
                Ok(flat) => {
                    let nested = nest_children(flat, &more.parent_id);
                    debug!(placeholder = %more.id, count = more.count, resolved = nested.len(), "Expanded collapsed comments");
                    let tail = container.split_off(index);
                    container.extend(nested);
                    container.extend(tail);
                }
                Err(e) => {
                    warn!(placeholder = %more.id, error = %e, "Failed to expand collapsed comments");
                }
            }
        }
    }
}

/// Index path (through `replies`) to the first expandable placeholder in
/// breadth-first order.
fn first_expandable(forest: &[CommentNode]) -> Option<Vec<usize>> {
    let mut queue: VecDeque<(Vec<usize>, &[CommentNode])> = VecDeque::new();
    queue.push_back((Vec::new(), forest));
    while let Some((prefix, level)) = queue.pop_front() {
        for (i, node) in level.iter().enumerate() {
            if let CommentNode::More(more) = node {
                if more.is_expandable() {
                    let mut path = prefix.clone();
                    path.push(i);
                    return Some(path);
                }
            }
        }
        for (i, node) in level.iter().enumerate() {
            if let CommentNode::Comment(comment) = node {
                let mut path = prefix.clone();
                path.push(i);
                queue.push_back((path, comment.replies.as_slice()));
            }
        }
    }
    None
}

/// The sibling list holding the node at `path`, and the node's index in it.
fn container_at<'a>(
    forest: &'a mut Vec<CommentNode>,
    path: &[usize],
) -> Option<(&'a mut Vec<CommentNode>, usize)> {
    let (&last, parents) = path.split_last()?;
    let mut current = forest;
    for &i in parents {
        current = match current.get_mut(i)? {
            CommentNode::Comment(comment) => &mut comment.replies,
            CommentNode::More(_) => return None,
        };
    }
    Some((current, last))
}

fn parent_of(node: &CommentNode) -> &str {
    match node {
        CommentNode::Comment(c) => &c.parent_id,
        CommentNode::More(m) => &m.parent_id,
    }
}

/// Re-nest a flat `morechildren` result under `root_parent`.
///
/// Nodes keep their relative order; nodes whose parent is not part of the
/// batch are attached at the root level rather than dropped.
fn nest_children(flat: Vec<CommentNode>, root_parent: &str) -> Vec<CommentNode> {
    let mut order: Vec<String> = Vec::new();
    let mut by_parent: HashMap<String, Vec<CommentNode>> = HashMap::new();
    for node in flat {
        let parent = parent_of(&node).to_string();
        if !by_parent.contains_key(&parent) {
            order.push(parent.clone());
        }
        by_parent.entry(parent).or_default().push(node);
    }

    fn build(parent: &str, by_parent: &mut HashMap<String, Vec<CommentNode>>) -> Vec<CommentNode> {
        let mut nodes = by_parent.remove(parent).unwrap_or_default();
        for node in nodes.iter_mut() {
            if let CommentNode::Comment(comment) = node {
                let fullname = if comment.name.is_empty() {
                    format!("t1_{}", comment.id)
                } else {
                    comment.name.clone()
                };
                let children = build(&fullname, by_parent);
                comment.replies.extend(children);
            }
        }
        nodes
    }

    let mut roots = build(root_parent, &mut by_parent);
    for parent in order {
        if by_parent.contains_key(&parent) {
            roots.extend(build(&parent, &mut by_parent));
        }
    }
    roots
}

#[async_trait]
impl ListingProvider for RedditClient {
    fn listing<'a>(&'a self, request: &'a ListingRequest) -> BoxStream<'a, Result<Entry>> {
        info!(listing = %request.label(), limit = ?request.limit, "Opening listing");
        let pager = Pager {
            after: None,
            remaining: request.limit,
            buffer: VecDeque::new(),
            exhausted: false,
        };
        stream::unfold(pager, move |mut pager| async move {
            loop {
                if pager.remaining == Some(0) {
                    return None;
                }
                if let Some(entry) = pager.buffer.pop_front() {
                    pager.remaining = pager.remaining.map(|r| r - 1);
                    return Some((Ok(entry), pager));
                }
                if pager.exhausted {
                    return None;
                }
                let page_size = pager.remaining.unwrap_or(PAGE_SIZE).min(PAGE_SIZE);
                match self.fetch_page(request, pager.after.as_deref(), page_size).await {
                    Ok((entries, next)) => {
                        pager.exhausted = next.is_none() || entries.is_empty();
                        pager.after = next;
                        pager.buffer.extend(entries);
                    }
                    Err(e) => {
                        pager.exhausted = true;
                        pager.buffer.clear();
                        pager.remaining = None;
                        return Some((Err(e), pager));
                    }
                }
            }
        })
        .boxed()
    }

    #[instrument(level = "debug", skip(self, submission), fields(id = %submission.id))]
    async fn comment_forest(
        &self,
        submission: &Submission,
        expand_budget: Option<usize>,
    ) -> Result<Vec<CommentNode>> {
        let url = self.url(&format!("/comments/{}.json", submission.id), &[])?;
        let pages: Vec<Listing> = self.fetcher.get_json(&url, &HeaderMap::new()).await?;
        let comments = pages
            .into_iter()
            .nth(1)
            .ok_or_else(|| Error::Listing(format!("no comment listing for {}", submission.id)))?;
        let mut forest = comments.into_comment_nodes();

        if let Some(budget) = expand_budget {
            let link_fullname = if submission.name.is_empty() {
                format!("t3_{}", submission.id)
            } else {
                submission.name.clone()
            };
            self.expand_placeholders(&link_fullname, &mut forest, budget).await;
        }
        Ok(forest)
    }

    #[instrument(level = "debug", skip(self))]
    async fn user_profile(&self, name: &str) -> Result<UserProfile> {
        let url = self.url(&format!("/user/{name}/about.json"), &[])?;
        let thing: Thing = self.fetcher.get_json(&url, &HeaderMap::new()).await?;
        Ok(serde_json::from_value(thing.data)?)
    }
}
