//! Media Catalog CLI
//!
//! Builds the catalog for a set of content directories and prints it.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use media_catalog::{
    Catalog, CatalogConfig, CatalogResult, ContentStream, EntryId, MediaServer, ROOT_ID,
};

const ABOUT: &str = r#"
Media Catalog - content directory indexer

Examples:
  media_catalog scan -c /path/to/media              index a single directory
  media_catalog scan -c /videos -c /photos          index several directories
  media_catalog scan -c /media --json               print the report as JSON
  media_catalog scan -c /media --tree               print the whole catalog tree
  media_catalog page -c /media                      print the status page
"#;

/// Media content catalog
#[derive(Parser)]
#[command(name = "media_catalog")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args)]
struct ContentArgs {
    /// Content directories to share (repeatable)
    #[arg(short = 'c', long = "content", required = true)]
    content_dirs: Vec<PathBuf>,

    /// Advertised host used in item URLs
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Advertised port used in item URLs
    #[arg(short = 'p', long, default_value_t = media_catalog::config::DEFAULT_PORT)]
    port: u16,

    /// Keep entries whose names are not valid UTF-8
    #[arg(long)]
    lossy_titles: bool,

    /// Maximum depth below each content directory
    #[arg(long, default_value_t = media_catalog::config::DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

impl ContentArgs {
    fn into_config(self) -> CatalogConfig {
        CatalogConfig::builder()
            .content_dirs(self.content_dirs)
            .address(self.host, self.port)
            .lossy_titles(self.lossy_titles)
            .max_depth(self.max_depth)
            .build()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Index content directories and print the build report
    Scan {
        #[command(flatten)]
        content: ContentArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Print the whole catalog tree as JSON
        #[arg(long)]
        tree: bool,
    },
    /// Index content directories and print the status page
    Page {
        #[command(flatten)]
        content: ContentArgs,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Scan {
            content,
            json,
            tree,
        }) => scan(content.into_config(), json, tree),
        Some(Commands::Page { content }) => page(content.into_config()),
        None => {
            println!("{}", ABOUT);
            println!("Use 'media_catalog --help' for the full help");
            Ok(())
        }
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn scan(config: CatalogConfig, json: bool, tree: bool) -> CatalogResult<()> {
    info!("Content directories: {:?}", config.content_dirs);
    let server = MediaServer::with_default_mime(config);
    let report = server.start()?;

    if tree {
        let catalog = server.catalog();
        print_json(&tree_json(&catalog, ROOT_ID));
    } else if json {
        print_json(&report);
    } else {
        if report.is_success() {
            println!("Catalog built:");
        } else {
            println!("Catalog built with errors:");
        }
        println!("  Generation: {}", report.generation);
        println!("  Directories: {}", report.containers);
        println!("  Items: {}", report.items);
        println!("  Unclassified files: {}", report.unclassified);
        println!("  Rejected names: {}", report.rejected);
        println!("  Errors: {}", report.error_count);
        println!("  Duration: {}ms", report.duration_ms);
        for (folder, count) in server.catalog().class_counts() {
            println!("  {}: {}", folder.name(), count);
        }
    }
    Ok(())
}

fn page(config: CatalogConfig) -> CatalogResult<()> {
    let page_name = config.presentation_page.clone();
    let server = MediaServer::with_default_mime(config);
    server.start()?;

    let mut stream = server.open(&page_name)?;
    let mut out = Vec::with_capacity(stream.len() as usize);
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    stream.close();
    print!("{}", String::from_utf8_lossy(&out));
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => log::error!("Cannot serialize output: {}", e),
    }
}

/// Nested JSON view of the subtree rooted at `id`
fn tree_json(catalog: &Catalog, id: EntryId) -> serde_json::Value {
    let Some(entry) = catalog.find_by_id(id) else {
        return serde_json::Value::Null;
    };
    let mut value = serde_json::to_value(entry).unwrap_or(serde_json::Value::Null);
    if let Some(object) = value.as_object_mut() {
        let children: Vec<_> = entry
            .children
            .iter()
            .map(|child| tree_json(catalog, *child))
            .collect();
        object.insert("children".to_string(), serde_json::Value::Array(children));
    }
    value
}
