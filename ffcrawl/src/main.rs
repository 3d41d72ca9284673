use colored::Colorize;
use ffcrawl_core::{CrawlError, Crawler, Outcome, ScanScope, Trip};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

mod commands;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let matches = commands::command_argument_builder().get_matches();
    let quiet = matches.get_flag("quiet");

    let (Some(target_raw), Some(start_name)) = (
        matches.get_one::<String>("TARGET"),
        matches.get_one::<String>("START"),
    ) else {
        // Not an error: just show how to start the crawler.
        let _ = commands::command_argument_builder().print_help();
        return;
    };

    let target = match Regex::new(target_raw) {
        Ok(re) => re,
        Err(e) => {
            eprintln!("{} {e}", "Invalid target pattern:".red());
            std::process::exit(1);
        }
    };

    let base = matches.get_one::<String>("base").unwrap();

    let scope = if matches.get_flag("no-container") {
        ScanScope::anywhere()
    } else {
        ScanScope {
            container_id: matches.get_one::<String>("container").cloned(),
            paragraphs_only: true,
        }
    };
    let timeout = *matches.get_one::<u64>("timeout").unwrap();

    // The listener only raises the flag; the traversal worker checks it
    // between steps. Repeated interrupts are absorbed here.
    let cancel = Arc::new(AtomicBool::new(false));
    let interrupt_flag = cancel.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            interrupt_flag.store(true, Ordering::SeqCst);
        }
    });

    let mut crawler = Crawler::with_timeout(base.clone(), timeout)
        .with_scope(scope)
        .with_article_only(!matches.get_flag("any-link"));

    // Resolve against the policy's normalized base so the start page
    // lies inside the same corpus boundary the crawl enforces.
    let start = match ffcrawl_core::resolve_article(crawler.policy().base(), start_name) {
        Ok(url) => url,
        Err(e) => {
            eprintln!("{} {e}", "Invalid start article:".red());
            std::process::exit(1);
        }
    };

    let spinner = if quiet {
        None
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        let progress = spinner.clone();
        crawler = crawler.with_progress_callback(Arc::new(move |follows, name| {
            progress.set_message(format!("Have followed {follows} links - at {name}"));
        }));
        Some(spinner)
    };

    let trip = crawler.run(start, &target, cancel).await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    print_trip(&trip, crawler.policy().base());

    match trip.outcome {
        Outcome::Matched { follows } => {
            println!("{}", format!("Found match, took {follows} follows").green());
        }
        Outcome::Cancelled => {
            println!("{}", "Interrupted - trip so far shown above".yellow());
        }
        Outcome::Failed(CrawlError::StartDeadEnd) => {
            eprintln!("{}", "Cannot find links on provided page".red());
            std::process::exit(1);
        }
        Outcome::Failed(e) => {
            eprintln!("{} {e}", "Crawl failed:".red());
            std::process::exit(1);
        }
    }
}

/// Each page on the trip next to its offset from the start article,
/// base URL stripped.
fn print_trip(trip: &Trip, base: &str) {
    for (offset, page) in trip.pages.iter().enumerate() {
        let name = page
            .url
            .as_str()
            .strip_prefix(base)
            .unwrap_or(page.url.as_str());
        println!("{offset}: {name}");
    }
}
