use anyhow::{Context, Result};
use clap::ArgMatches;
use cmscout_core::api::{DEFAULT_WP_ENDPOINT, HostingAction};
use cmscout_core::report::{generate_crawl_report, generate_detection_report};
use cmscout_core::tools::{
    CRAWL_SITE, DETECT_CMS, EXTRACT_CONTENT, HOSTINGER_API_CONNECT, ToolCall, ToolOutcome,
    WORDPRESS_API_CONNECT, render_outcome,
};
use cmscout_core::{Config, Toolbox};
use cmscout_scanner::crawler::DEFAULT_CRAWL_DEPTH;
use cmscout_scanner::{ContentType, CrawlNode, DetectionResult};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&str>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        parse_url_line(url.trim())
            .map(|url| vec![url])
            .ok_or_else(|| format!("Invalid URL '{}'", url))
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file, skipping blank lines and `#` comments
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as an http(s) URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
        && url.has_host()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok_and(|url| url.has_host()) {
        return Some(with_scheme);
    }

    eprintln!("⚠️  Skipping invalid URL '{}'", line);
    None
}

/// Write `contents` to `path`, expanding a leading `~`.
pub fn write_output(path: &Path, contents: &str) -> Result<PathBuf> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let target = PathBuf::from(expanded);
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(&target, contents)
        .with_context(|| format!("Failed to write output to {}", target.display()))?;
    Ok(target)
}

/// Environment configuration with the global CLI overrides applied.
pub fn build_config(args: &ArgMatches) -> Config {
    let mut config = Config::from_env();
    if let Some(chrome) = args.get_one::<PathBuf>("chrome") {
        config.chrome_executable = Some(chrome.clone());
    }
    if let Some(secs) = args.get_one::<u64>("timeout") {
        config.fetch_timeout_secs = *secs;
    }
    if let Some(secs) = args.get_one::<u64>("probe-timeout") {
        config.probe_timeout_secs = *secs;
    }
    if let Some(secs) = args.get_one::<u64>("nav-timeout") {
        config.navigation_timeout_secs = *secs;
    }
    config
}

/// Detection output: the tool text, or a readable report when asked for one.
pub fn render_detection(outcome: &ToolOutcome, report: bool) -> String {
    match outcome {
        Ok(value) if report => match serde_json::from_value::<DetectionResult>(value.clone()) {
            Ok(result) => generate_detection_report(&result),
            Err(_) => render_outcome(DETECT_CMS, outcome),
        },
        _ => render_outcome(DETECT_CMS, outcome),
    }
}

/// Crawl output: the tool text, or a tree report when asked for one.
pub fn render_crawl(outcome: &ToolOutcome, report: bool) -> String {
    match outcome {
        Ok(value) if report => match serde_json::from_value::<Option<CrawlNode>>(value.clone()) {
            Ok(root) => generate_crawl_report(root.as_ref()),
            Err(_) => render_outcome(CRAWL_SITE, outcome),
        },
        _ => render_outcome(CRAWL_SITE, outcome),
    }
}

fn spinner(quiet: bool, message: String) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}

fn make_toolbox(config: &Config) -> Result<Toolbox> {
    debug!("Using configuration {:?}", config);
    Toolbox::new(config).context("Failed to initialise tools")
}

fn emit(text: &str, output: Option<&PathBuf>, quiet: bool) -> Result<()> {
    match output {
        Some(path) => {
            let written = write_output(path, text)?;
            if !quiet {
                eprintln!(
                    "{} Output written to {}",
                    "✓".green().bold(),
                    written.display().to_string().bright_white()
                );
            }
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn exit_code(all_ok: bool) -> ExitCode {
    if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn required_url(args: &ArgMatches) -> Result<String> {
    let raw = args
        .get_one::<String>("url")
        .context("--url must be provided")?;
    parse_url_line(raw.trim()).with_context(|| format!("Invalid URL '{}'", raw))
}

async fn run_single(
    toolbox: &Toolbox,
    call: ToolCall,
    quiet: bool,
    render: impl FnOnce(&ToolOutcome) -> String,
    output: Option<&PathBuf>,
) -> Result<ExitCode> {
    let pb = spinner(quiet, format!("Running {}...", call.name()));
    let outcome = toolbox.call(call).await;
    pb.finish_and_clear();

    emit(&render(&outcome), output, quiet)?;
    Ok(exit_code(outcome.is_ok()))
}

pub async fn handle_detect(args: &ArgMatches, quiet: bool) -> Result<ExitCode> {
    let urls = load_urls_from_source(
        args.get_one::<String>("url").map(String::as_str),
        args.get_one::<PathBuf>("hosts-file"),
    )
    .map_err(anyhow::Error::msg)?;
    let report = args.get_flag("report");
    let toolbox = make_toolbox(&build_config(args))?;

    let mut sections = Vec::with_capacity(urls.len());
    let mut all_ok = true;
    for url in urls {
        let pb = spinner(quiet, format!("Fingerprinting {}", url));
        let outcome = toolbox.call(ToolCall::DetectCms { url }).await;
        pb.finish_and_clear();

        all_ok &= outcome.is_ok();
        sections.push(render_detection(&outcome, report));
    }

    emit(&sections.join("\n"), args.get_one::<PathBuf>("output"), quiet)?;
    Ok(exit_code(all_ok))
}

pub async fn handle_extract(args: &ArgMatches, quiet: bool) -> Result<ExitCode> {
    let url = required_url(args)?;
    let content_type = match args.get_one::<String>("content-type") {
        Some(raw) => raw.parse::<ContentType>()?,
        None => ContentType::default(),
    };
    let toolbox = make_toolbox(&build_config(args))?;

    run_single(
        &toolbox,
        ToolCall::ExtractContent { url, content_type },
        quiet,
        |outcome| render_outcome(EXTRACT_CONTENT, outcome),
        args.get_one::<PathBuf>("output"),
    )
    .await
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<ExitCode> {
    let url = required_url(args)?;
    let depth = args.get_one::<usize>("depth").copied().unwrap_or(DEFAULT_CRAWL_DEPTH);
    let bypass_protection = !args.get_flag("no-bypass");
    let report = args.get_flag("report");

    let mut config = build_config(args);
    if let Some(scope) = args.get_one::<String>("scope") {
        config.link_scope = scope.parse()?;
    }
    if let Some(domain) = args.get_one::<String>("domain") {
        config.crawl_domain = Some(domain.clone());
    }
    let toolbox = make_toolbox(&config)?;

    if !quiet {
        eprintln!(
            "\n🕷️  Crawling {} (depth {}, scope {})\n",
            url.bright_white(),
            depth,
            config.link_scope
        );
    }

    run_single(
        &toolbox,
        ToolCall::CrawlSite {
            url,
            depth,
            bypass_protection,
        },
        quiet,
        |outcome| render_crawl(outcome, report),
        args.get_one::<PathBuf>("output"),
    )
    .await
}

pub async fn handle_wp_api(args: &ArgMatches, quiet: bool) -> Result<ExitCode> {
    let url = required_url(args)?;
    let endpoint = args
        .get_one::<String>("endpoint")
        .cloned()
        .unwrap_or_else(|| DEFAULT_WP_ENDPOINT.to_string());
    let toolbox = make_toolbox(&build_config(args))?;

    run_single(
        &toolbox,
        ToolCall::WordPressApi { url, endpoint },
        quiet,
        |outcome| render_outcome(WORDPRESS_API_CONNECT, outcome),
        args.get_one::<PathBuf>("output"),
    )
    .await
}

pub async fn handle_hosting(args: &ArgMatches, quiet: bool) -> Result<ExitCode> {
    let action: HostingAction = args
        .get_one::<String>("action")
        .context("--action must be provided")?
        .parse()?;
    let toolbox = make_toolbox(&build_config(args))?;

    run_single(
        &toolbox,
        ToolCall::HostingApi { action },
        quiet,
        |outcome| render_outcome(HOSTINGER_API_CONNECT, outcome),
        args.get_one::<PathBuf>("output"),
    )
    .await
}

pub async fn handle_serve(args: &ArgMatches) -> Result<ExitCode> {
    let toolbox = make_toolbox(&build_config(args))?;
    crate::server::serve_stdio(&toolbox).await?;
    Ok(ExitCode::SUCCESS)
}
