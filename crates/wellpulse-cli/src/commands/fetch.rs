use std::sync::Arc;

use clap::Args;
use wellpulse_core::{Category, Config, ContentFeed, HttpContentSource, RateLimitedCache};

use super::print_json;
use super::session::CmdResult;

#[derive(Args)]
pub struct FetchArgs {
    /// Categories to fetch; your goals when empty
    categories: Vec<Category>,
}

pub fn run(args: FetchArgs) -> CmdResult {
    let config = Config::load()?;
    let categories = if args.categories.is_empty() {
        config.goals.clone()
    } else {
        args.categories
    };

    let source = HttpContentSource::new(&config.content)?;
    let cache = Arc::new(RateLimitedCache::new(config.cache.clone()));
    let feed = ContentFeed::new(source, cache, config.goals.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let batch = runtime.block_on(feed.fetch_categories(&categories));
    print_json(&batch)
}
