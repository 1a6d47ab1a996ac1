use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use listmark::{Config, Error, Node};
use serde_json::Value;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Outline,
}

#[derive(Parser)]
#[command(name = "listmark")]
#[command(about = "Number the lists of Markdown/MDX documents")]
struct Cli {
    /// Input Markdown file (or mdast JSON tree with --tree)
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Config file
    #[arg(short, long, default_value = "listmark.toml")]
    config: PathBuf,

    /// Treat the input as an mdast JSON tree instead of Markdown
    #[arg(long)]
    tree: bool,

    /// Source text the tree's positions refer to (with --tree)
    #[arg(long, requires = "tree")]
    source: Option<PathBuf>,
}

fn read(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn run(cli: &Cli) -> Result<(), Error> {
    let config = Config::load(&cli.config)?;
    let input = read(&cli.input)?;

    let (root, json): (Node, Value) = if cli.tree {
        let source = cli.source.as_deref().map(read).transpose()?;
        let tree = serde_json::from_str(&input)?;
        let json = listmark::number_json_value(tree, source.as_deref(), &config)?;
        (serde_json::from_value(json.clone())?, json)
    } else {
        let root = listmark::number_with_config(&input, &config);
        let json = serde_json::to_value(&root)?;
        (root, json)
    };
    log::info!(
        "Numbered {} lists in {}",
        listmark::lists(&root).len(),
        cli.input.display()
    );

    let rendered = match cli.format {
        Format::Json => serde_json::to_string_pretty(&json)? + "\n",
        Format::Outline => listmark::tree_to_outline(&root, &config),
    };

    match &cli.output {
        Some(output) => {
            fs::write(output, rendered).map_err(|source| Error::Io {
                path: output.clone(),
                source,
            })?;
            log::info!("Created {}", output.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
