use anyhow::{Context, Result, bail};
use btree::{Node, NodeSnapshot, PagedTree};
use clap::{Parser, ValueEnum};
use codec::{Codec, INT_WIDTH, parse_field_type};
use common::{
    Config, Offset,
    logging::init_tracing,
    pretty::{self, TableStyleKind},
};
use std::path::{Path, PathBuf};
use storage::FilePageStore;
use tracing::debug;
use types::FieldType;

fn main() {
    init_tracing("warn");
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let key = key_codec(&args.key_type, args.key_width)?;
    let tree = open_tree(&args.index_path, args.page_size, key, args.value_width)?;

    if args.check {
        tree.verify().context("tree failed verification")?;
        println!("ok: {} entries, height {}", tree.len()?, tree.height()?);
        return Ok(());
    }

    match args.format {
        OutputFormat::Levels => {
            let style: TableStyleKind = args.style.into();
            println!("{}", render_levels(&tree, style)?);
        }
        OutputFormat::Json => {
            println!("{}", hex_snapshot(&tree)?.to_json()?);
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "page-viewer")]
#[command(about = "Inspect the nodes of a persisted B+Tree index", long_about = None)]
struct Args {
    /// Path to the index file
    index_path: PathBuf,
    /// Key type the tree was created with (int or text)
    #[arg(long)]
    key_type: String,
    /// Key width in bytes; integers are always 8
    #[arg(long)]
    key_width: Option<usize>,
    /// Width of each leaf value slot in bytes
    #[arg(long)]
    value_width: usize,
    /// Page size the file was written with
    #[arg(long, default_value_t = Config::default().page_size)]
    page_size: usize,
    /// Output format (levels or json)
    #[arg(long, value_enum, default_value_t = OutputFormat::Levels)]
    format: OutputFormat,
    /// Style used for table rendering
    #[arg(long, value_enum, default_value_t = CliTableStyle::Modern)]
    style: CliTableStyle,
    /// Only check structural invariants and report the result
    #[arg(long)]
    check: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Levels,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CliTableStyle {
    Modern,
    Ascii,
    Plain,
}

impl From<CliTableStyle> for TableStyleKind {
    fn from(value: CliTableStyle) -> Self {
        match value {
            CliTableStyle::Modern => TableStyleKind::Modern,
            CliTableStyle::Ascii => TableStyleKind::Ascii,
            CliTableStyle::Plain => TableStyleKind::Plain,
        }
    }
}

const LEVEL_HEADERS: [&str; 5] = ["Level", "Offset", "Kind", "Keys", "Children / Values"];

type ViewerTree = PagedTree<FilePageStore, Vec<u8>>;

fn key_codec(key_type: &str, key_width: Option<usize>) -> Result<Codec> {
    let field_type = parse_field_type(key_type)?;
    let codec = match (field_type, key_width) {
        (FieldType::Int, None | Some(INT_WIDTH)) => Codec::int(),
        (FieldType::Int, Some(other)) => bail!("int keys are {INT_WIDTH} bytes, not {other}"),
        (FieldType::Text, Some(width)) => Codec::text(width)?,
        (FieldType::Text, None) => bail!("--key-width is required for text keys"),
    };
    Ok(codec)
}

fn open_tree(path: &Path, page_size: usize, key: Codec, value_width: usize) -> Result<ViewerTree> {
    let pages = FilePageStore::open_read_only(path, page_size)
        .with_context(|| format!("failed to open index at {}", path.display()))?;
    debug!(path = %path.display(), page_size, "opened index file");
    let tree = PagedTree::open(pages, key, value_width)
        .with_context(|| format!("{} is not a tree with this layout", path.display()))?;
    Ok(tree)
}

fn render_levels(tree: &ViewerTree, style: TableStyleKind) -> Result<String> {
    let key = tree.key_codec();
    let mut rows = Vec::new();
    for (depth, level) in tree.level_order()?.into_iter().enumerate() {
        for (offset, node) in level {
            rows.push(node_to_cells(depth, offset, &node, &key)?);
        }
    }
    Ok(pretty::render_string_table(&LEVEL_HEADERS, rows, style))
}

fn node_to_cells(depth: usize, offset: Offset, node: &Node<Vec<u8>>, key: &Codec) -> Result<Vec<String>> {
    let keys = node
        .keys()
        .into_iter()
        .map(|raw| key.decode(raw))
        .collect::<common::DbResult<Vec<_>>>()?;
    let (kind, links) = match node {
        Node::Internal { children, .. } => (
            "internal",
            children
                .iter()
                .map(|&c| pretty::format_offset(c))
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Node::Leaf { entries } => (
            "leaf",
            entries
                .iter()
                .map(|(_, v)| pretty::format_bytes(v))
                .collect::<Vec<_>>()
                .join(", "),
        ),
    };
    Ok(vec![
        depth.to_string(),
        pretty::format_offset(offset),
        kind.into(),
        pretty::format_values(&keys),
        links,
    ])
}

/// Snapshot of the tree with values rendered as hex.
fn hex_snapshot(tree: &ViewerTree) -> Result<NodeSnapshot<String>> {
    Ok(tree.snapshot()?.map_values(&|raw: Vec<u8>| pretty::format_bytes(&raw)))
}
