mod checkout;
mod commands;
mod error;
mod hash;
mod object;
mod pack;
mod pktline;
mod repo;
mod sideband;
mod transport;
mod zlib;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty Git repository
    Init {
        /// Directory to create the repository in
        #[arg(default_value = ".")]
        directory: PathBuf,
    },

    /// Provide content or type and size information for repository objects
    CatFile {
        /// Show object type
        #[arg(short, conflicts_with_all = ["size_only", "pretty_print"])]
        type_only: bool,

        /// Show object size
        #[arg(short, conflicts_with_all = ["type_only", "pretty_print"])]
        size_only: bool,

        /// Pretty-print object's content
        #[arg(short, conflicts_with_all = ["size_only", "type_only"])]
        pretty_print: bool,

        /// Object hash
        #[arg(id = "object")]
        hash: String,
    },

    /// Compute object ID and optionally create an object from a file
    HashObject {
        /// Actually write the object into the object database
        #[arg(short)]
        write: bool,

        /// Object type (only "blob" is supported)
        #[arg(short, id = "type", default_value = "blob")]
        typ: String,

        #[arg(id = "file")]
        file: PathBuf,
    },

    /// List the contents of a tree object
    LsTree {
        /// Recurse into subtrees
        #[arg(short, long)]
        recurse: bool,

        /// Show only file names
        #[arg(long = "name-only")]
        name_only: bool,

        hash: String,
    },

    /// Create a tree object from the current working tree
    WriteTree,

    /// Create a commit object from a tree and a message
    CommitTree {
        tree: String,

        #[arg(short = 'm')]
        message: String,

        #[arg(short = 'p')]
        parents: Vec<String>,
    },

    /// Clone a repository over Smart HTTP v1
    Clone {
        repository: String,

        directory: Option<PathBuf>,
    },
}

fn run() -> anyhow::Result<()> {
    let args = Cli::parse();
    match args.command {
        Commands::Init { directory } => commands::init::invoke(&directory),
        Commands::CatFile {
            pretty_print,
            type_only,
            size_only,
            hash,
        } => commands::cat_file::invoke(Path::new("."), &hash, type_only, size_only, pretty_print),
        Commands::HashObject { write, file, typ } => {
            anyhow::ensure!(
                typ == "blob",
                error::GitError::Usage(format!("unsupported object type '{typ}' (only 'blob' is supported)"))
            );
            let sha = commands::hash_object::invoke(Path::new("."), &file, write)?;
            print!("{}", hex::encode(sha));
            std::io::stdout().flush()?;
            Ok(())
        }
        Commands::LsTree {
            recurse,
            name_only,
            hash,
        } => commands::ls_tree::invoke(Path::new("."), &hash, recurse, name_only),
        Commands::WriteTree => commands::write_tree::invoke(Path::new(".")),
        Commands::CommitTree {
            tree,
            message,
            parents,
        } => {
            let sha = commands::commit_tree::invoke(Path::new("."), &tree, &message, &parents)?;
            println!("{}", hex::encode(sha));
            Ok(())
        }
        Commands::Clone { repository, directory } => commands::clone::invoke(&repository, directory),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(error::exit_code_for(&err));
    }
}
