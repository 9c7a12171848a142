use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use packetforge_core::{
    EditIntent, FieldView, Oracle, PacketDocument, ProtocolCatalog, ProtocolLayer, RemoteOracle,
};

mod script;

use script::{Located, ScriptCommand};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("PACKETFORGE_BUILD_COMMIT"),
    " ",
    env!("PACKETFORGE_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "packetforge")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Assemble and edit network packets against a reconstruction oracle.",
    long_about = None,
    after_help = "Examples:\n  packetforge catalog list -c catalog.json\n  packetforge catalog show -c catalog.json Ether\n  packetforge assemble build.pf -c catalog.json --oracle 127.0.0.1:29941 -o packet.bin"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect a protocol catalog file.
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Run an assembly script against a live oracle and save the packet bytes.
    Assemble {
        /// Path to the assembly script
        script: PathBuf,

        /// Protocol catalog JSON file
        #[arg(short = 'c', long)]
        catalog: PathBuf,

        /// Oracle address (host:port)
        #[arg(long)]
        oracle: String,

        /// Output path for the packet bytes
        #[arg(short = 'o', long, required_unless_present = "show")]
        out: Option<PathBuf>,

        /// Start from an existing packet blob instead of an empty packet
        #[arg(long)]
        load: Option<PathBuf>,

        /// Print the final layer stack to stdout
        #[arg(long)]
        show: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CatalogCommands {
    /// List protocols and their payload successors.
    List {
        /// Protocol catalog JSON file
        #[arg(short = 'c', long)]
        catalog: PathBuf,
    },
    /// Show the field table of one protocol.
    Show {
        /// Protocol catalog JSON file
        #[arg(short = 'c', long)]
        catalog: PathBuf,

        /// Protocol id
        protocol: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Catalog { command } => match command {
            CatalogCommands::List { catalog } => cmd_catalog_list(catalog),
            CatalogCommands::Show { catalog, protocol } => cmd_catalog_show(catalog, protocol),
        },
        Commands::Assemble {
            script,
            catalog,
            oracle,
            out,
            load,
            show,
        } => cmd_assemble(script, catalog, oracle, out, load, show),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(err.to_string(), None)
    }
}

fn load_catalog(path: &PathBuf) -> Result<ProtocolCatalog, CliError> {
    ProtocolCatalog::load(path).map_err(|err| {
        CliError::new(
            format!("failed to load catalog {}: {}", path.display(), err),
            Some("pass a catalog JSON file with -c/--catalog".to_string()),
        )
    })
}

fn cmd_catalog_list(catalog: PathBuf) -> Result<(), CliError> {
    let catalog = load_catalog(&catalog)?;
    println!("base protocol: {}", catalog.base_protocol().id);
    for protocol in catalog.list_all() {
        let payload = if protocol.payload.is_empty() {
            "-".to_string()
        } else {
            protocol.payload.join(", ")
        };
        println!("{:<12} {:<20} payload: {}", protocol.id, protocol.name, payload);
    }
    Ok(())
}

fn cmd_catalog_show(catalog: PathBuf, protocol: String) -> Result<(), CliError> {
    let catalog = load_catalog(&catalog)?;
    let definition = catalog.lookup_by_id(&protocol).ok_or_else(|| {
        CliError::new(
            format!("unknown protocol '{}'", protocol),
            Some("run `packetforge catalog list` to see the defined ids".to_string()),
        )
    })?;

    println!("{} ({})", definition.name, definition.id);
    for field in &definition.fields {
        let mut extras = Vec::new();
        if let Some(dictionary) = &field.dictionary {
            extras.push(format!("{} named values", dictionary.len()));
        }
        if !field.bits.is_empty() {
            extras.push(format!("{} bit flags", field.bits.len()));
        }
        let extras = if extras.is_empty() {
            String::new()
        } else {
            format!("  ({})", extras.join(", "))
        };
        println!("  {:<12} {:<24} {:?}{}", field.id, field.name, field.kind, extras);
    }
    Ok(())
}

fn cmd_assemble(
    script_path: PathBuf,
    catalog_path: PathBuf,
    oracle_addr: String,
    out: Option<PathBuf>,
    load: Option<PathBuf>,
    show: bool,
) -> Result<(), CliError> {
    let source = fs::read_to_string(&script_path)
        .with_context(|| format!("Failed to read script: {}", script_path.display()))?;
    let commands = script::parse(&source).map_err(|err| {
        CliError::new(
            format!("{}: {}", script_path.display(), err),
            Some("see `packetforge assemble --help` for the script commands".to_string()),
        )
    })?;

    let catalog = Arc::new(load_catalog(&catalog_path)?);
    let oracle = RemoteOracle::connect(&oracle_addr).map_err(|err| {
        CliError::new(
            format!("failed to connect to oracle at {}: {}", oracle_addr, err),
            Some("is the reconstruction oracle running?".to_string()),
        )
    })?;
    let mut document = PacketDocument::new(oracle, catalog);

    if let Some(load_path) = load {
        let bytes = fs::read(&load_path)
            .with_context(|| format!("Failed to read packet: {}", load_path.display()))?;
        document
            .load_bytes(&bytes)
            .map_err(|err| CliError::new(format!("failed to load packet: {}", err), None))?;
    }

    run_script(&mut document, &commands)?;

    if let Some(out_path) = out.as_ref() {
        fs::write(out_path, document.bytes())
            .with_context(|| format!("Failed to write packet: {}", out_path.display()))?;
        eprintln!(
            "OK: {} bytes, {} layers -> {}",
            document.bytes().len(),
            document.layers().len(),
            out_path.display()
        );
    }
    if show {
        print_layers(document.layers());
    }
    Ok(())
}

fn run_script<O: Oracle>(
    document: &mut PacketDocument<O>,
    commands: &[Located],
) -> Result<(), CliError> {
    for Located { line, command } in commands {
        let result = match command.clone() {
            ScriptCommand::Append(protocol) => document.append_protocol(&protocol),
            ScriptCommand::Remove => document.remove_top_protocol(),
            ScriptCommand::Set {
                protocol,
                field,
                value,
            } => document.edit_field(&protocol, &field, EditIntent::Literal(value)),
            ScriptCommand::Expr {
                protocol,
                field,
                expr,
            } => document.edit_field(&protocol, &field, EditIntent::Expression(expr)),
            ScriptCommand::Raw {
                protocol,
                field,
                bytes,
            } => document.edit_field(&protocol, &field, EditIntent::Raw(bytes)),
            ScriptCommand::Reset { protocol, field } => {
                document.edit_field(&protocol, &field, EditIntent::Reset)
            }
            ScriptCommand::Random { protocol, field } => {
                document.edit_field(&protocol, &field, EditIntent::Randomize)
            }
            ScriptCommand::Recalc => document.recalculate_auto_values(),
            ScriptCommand::Undo => {
                document.undo();
                Ok(())
            }
            ScriptCommand::Redo => {
                document.redo();
                Ok(())
            }
            ScriptCommand::Show => {
                print_layers(document.layers());
                Ok(())
            }
        };
        result.map_err(|err| {
            CliError::new(
                format!("line {}: {}", line, err),
                Some("earlier script commands were already applied".to_string()),
            )
        })?;
    }
    Ok(())
}

fn print_layers(layers: &[ProtocolLayer]) {
    if layers.is_empty() {
        println!("(empty packet)");
        return;
    }
    for layer in layers {
        println!("{} ({}) @ {}", layer.name(), layer.protocol_id, layer.offset);
        for view in &layer.fields {
            println!("  {}", format_field(view));
        }
    }
}

fn format_field(view: &FieldView) -> String {
    let mut line = format!(
        "{:<12} {:<24} [{}..{})",
        view.field.id,
        view.display_value(),
        view.range.start,
        view.range.end
    );
    if view.field.value_expr.is_some() {
        line.push_str("  expr");
    }
    if view.field.ignored {
        line.push_str("  ignored");
    }
    line
}
