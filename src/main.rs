use anyhow::Result;
use clap::{Parser, Subcommand};
use kevin::data::DefinitionKind;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "kevin")]
#[command(about = "A conversational assistant that generates and lint-fixes code from boilerplate", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Path to a YAML settings file (defaults to kevin.yml)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Perform a dry run without writing files or committing")]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Gather requirements interactively, then generate and lint-fix the code")]
    Chat,

    #[command(about = "Generate code from boilerplate for a known model")]
    Generate {
        #[arg(long, help = "Model or entity name, e.g. User")]
        model: String,

        #[arg(long, help = "Comma-separated field list, e.g. id,name,email")]
        fields: String,

        #[arg(long, help = "Folder the generated files are written under")]
        folder: String,

        #[arg(long, help = "Run the lint-and-fix loop on every generated file")]
        lint: bool,

        #[arg(long, help = "Lint-fix attempts per file (defaults to the configured budget)")]
        attempts: Option<usize>,
    },

    #[command(about = "Generate one file from a section of the definition file")]
    GenerateDef {
        #[arg(long, help = "Section to generate: prisma_schema, api_route, api_route_filters, table_ui or form_ui")]
        kind: DefinitionKind,

        #[arg(long, help = "Definition file (defaults to the configured definition_file)")]
        definition: Option<PathBuf>,

        #[arg(long, help = "Directory the file is written under")]
        output: PathBuf,

        #[arg(long, help = "Lint-fix attempts for the generated file (defaults to 1)")]
        attempts: Option<usize>,
    },

    #[command(about = "Lint a file and ask for fixes until it is clean")]
    LintFix {
        #[arg(help = "File to lint and repair")]
        file: PathBuf,

        #[arg(long, help = "Lint-fix attempts (defaults to the configured budget)")]
        attempts: Option<usize>,
    },

    #[command(about = "Modify an existing file following an instruction")]
    Edit {
        #[arg(help = "File to edit")]
        file: PathBuf,

        #[arg(help = "What to change", required = true, trailing_var_arg = true)]
        instruction: Vec<String>,

        #[arg(long, help = "Lint-fix attempts after the edit (defaults to the configured budget)")]
        attempts: Option<usize>,

        #[arg(long, help = "Restore the original file when the edit does not lint clean")]
        revert_on_unverified: bool,
    },

    #[command(about = "Commit every file the assistant touched")]
    Commit {
        #[arg(long, short, help = "Commit message (synthesized from the instructions when omitted)")]
        message: Option<String>,
    },

    #[command(about = "Show the generation log")]
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = cli::Config {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };
    let settings = cli::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Chat => {
            cli::chat(settings, &config).await?;
        }
        Commands::Generate {
            model,
            fields,
            folder,
            lint,
            attempts,
        } => {
            cli::generate(settings, model, fields, folder, lint, attempts, &config).await?;
        }
        Commands::GenerateDef {
            kind,
            definition,
            output,
            attempts,
        } => {
            cli::generate_from_definition(settings, kind, definition, output, attempts, &config).await?;
        }
        Commands::LintFix { file, attempts } => {
            cli::lint_fix(settings, file, attempts, &config).await?;
        }
        Commands::Edit {
            file,
            instruction,
            attempts,
            revert_on_unverified,
        } => {
            cli::edit(settings, file, instruction.join(" "), attempts, revert_on_unverified, &config).await?;
        }
        Commands::Commit { message } => {
            cli::commit(settings, message, &config).await?;
        }
        Commands::Status => {
            cli::status(&settings)?;
        }
    }

    Ok(())
}
