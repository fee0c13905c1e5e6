//! Command-line interface definitions.
//!
//! One subcommand per scope. Every subcommand shares the output and stage
//! options in [`CommonArgs`] and turns into a list of [`Target`]s: the
//! listings to walk, plus the user whose profile is saved first.

use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::reddit::{
    ListingRequest, SEARCH_SORTS, SUBREDDIT_CATEGORIES, Scope, TIME_FILTERS, USER_SORTS,
};

/// Listings of a user that can be archived without authentication.
pub const USER_LISTINGS: &[&str] = &["submitted", "comments"];

/// Archive subreddits, multireddits, searches and users.
///
/// # Examples
///
/// ```sh
/// # Top-level comments of the 10 hottest posts of two subreddits
/// reddit_archiver subreddit pics aww -f hot -l 10 -o ./archive
///
/// # Whole comment threads, no videos
/// reddit_archiver subreddit rust -o ./archive --all-comments --skip-videos
///
/// # A search across subreddits
/// reddit_archiver search rust programming -q "async traits" -s top -o ./archive
///
/// # A user's submissions and comments
/// reddit_archiver user spez -o ./archive
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML config (default: ~/.saveddit/user_config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Imgur API client id; overrides the config file
    #[arg(long, env = "IMGUR_CLIENT_ID", global = true)]
    pub imgur_client_id: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every scope.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Output root directory
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Maximum number of entries per listing
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// Do not download video content
    #[arg(long)]
    pub skip_videos: bool,

    /// Do not write submission.json
    #[arg(long)]
    pub skip_meta: bool,

    /// Do not write comments.json
    #[arg(long)]
    pub skip_comments: bool,

    /// Save whole comment threads instead of top-level comments only
    #[arg(long)]
    pub all_comments: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Archive one or more subreddits
    Subreddit {
        /// Subreddit names, without the `r/` prefix
        #[arg(required = true)]
        names: Vec<String>,

        /// Categories to fetch
        #[arg(
            short = 'f',
            long = "categories",
            value_delimiter = ',',
            value_parser = PossibleValuesParser::new(SUBREDDIT_CATEGORIES.iter().copied()),
            default_values_t = SUBREDDIT_CATEGORIES.iter().map(|c| c.to_string()).collect::<Vec<_>>()
        )]
        categories: Vec<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Archive several subreddits combined into one listing
    Multireddit {
        /// Subreddit names, without the `r/` prefix
        #[arg(required = true, num_args = 2..)]
        names: Vec<String>,

        /// Categories to fetch
        #[arg(
            short = 'f',
            long = "categories",
            value_delimiter = ',',
            value_parser = PossibleValuesParser::new(SUBREDDIT_CATEGORIES.iter().copied()),
            default_values_t = SUBREDDIT_CATEGORIES.iter().map(|c| c.to_string()).collect::<Vec<_>>()
        )]
        categories: Vec<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Archive the results of a search
    Search {
        /// Subreddits to search in
        #[arg(required = true)]
        subreddits: Vec<String>,

        /// Search query
        #[arg(short = 'q', long)]
        query: String,

        /// Sort order
        #[arg(
            short = 's',
            long,
            default_value = "relevance",
            value_parser = PossibleValuesParser::new(SEARCH_SORTS.iter().copied())
        )]
        sort: String,

        /// Time filter
        #[arg(
            short = 't',
            long = "time-filter",
            default_value = "all",
            value_parser = PossibleValuesParser::new(TIME_FILTERS.iter().copied())
        )]
        time_filter: String,

        /// Include NSFW results
        #[arg(long)]
        include_nsfw: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Archive users' profiles, submissions and comments
    User {
        /// User names, without the `u/` prefix
        #[arg(required = true)]
        names: Vec<String>,

        /// Listings to fetch
        #[arg(
            short = 'f',
            long = "listings",
            value_delimiter = ',',
            value_parser = PossibleValuesParser::new(USER_LISTINGS.iter().copied()),
            default_values_t = USER_LISTINGS.iter().map(|c| c.to_string()).collect::<Vec<_>>()
        )]
        listings: Vec<String>,

        /// Sort orders to fetch each listing by
        #[arg(
            short = 's',
            long = "sort",
            value_delimiter = ',',
            value_parser = PossibleValuesParser::new(USER_SORTS.iter().copied()),
            default_value = "new"
        )]
        sorts: Vec<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Listings to walk; `user` is set for user scopes, whose profile is saved
/// before the listings.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub user: Option<String>,
    pub requests: Vec<ListingRequest>,
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Command::Subreddit { common, .. }
            | Command::Multireddit { common, .. }
            | Command::Search { common, .. }
            | Command::User { common, .. } => common,
        }
    }

    /// Expand the command into the listings it names.
    pub fn targets(&self) -> Vec<Target> {
        let limit = self.common().limit.map(|l| l as usize);
        let request = |scope: Scope, category: &str, sort: Option<&str>| ListingRequest {
            scope,
            category: category.to_string(),
            sort: sort.map(str::to_string),
            limit,
        };

        match self {
            Command::Subreddit {
                names, categories, ..
            } => names
                .iter()
                .map(|name| Target {
                    user: None,
                    requests: categories
                        .iter()
                        .map(|c| request(Scope::Subreddit(name.clone()), c, None))
                        .collect(),
                })
                .collect(),
            Command::Multireddit {
                names, categories, ..
            } => vec![Target {
                user: None,
                requests: categories
                    .iter()
                    .map(|c| request(Scope::Multireddit(names.clone()), c, None))
                    .collect(),
            }],
            Command::Search {
                subreddits,
                query,
                sort,
                time_filter,
                include_nsfw,
                ..
            } => vec![Target {
                user: None,
                requests: vec![request(
                    Scope::Search {
                        query: query.clone(),
                        subreddits: subreddits.clone(),
                        time_filter: time_filter.clone(),
                        include_nsfw: *include_nsfw,
                    },
                    "search",
                    Some(sort),
                )],
            }],
            Command::User {
                names,
                listings,
                sorts,
                ..
            } => names
                .iter()
                .map(|name| Target {
                    user: Some(name.clone()),
                    requests: listings
                        .iter()
                        .flat_map(|listing| {
                            sorts.iter().map(move |sort| (listing, sort))
                        })
                        .map(|(listing, sort)| {
                            request(Scope::User(name.clone()), listing, Some(sort))
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}
