use clap::Parser;
use dirs::home_dir;
use ecmachine::{
    cli::{Args, Commands},
    error::Result,
    extensions::ResultExtensions,
    filesystem::{FileSystem, MemoryFs},
    parser::parse_program,
    repl::{Headless, REPLPrompt, REPLValidator, SyntaxHighlighter},
    runtime::{Config, Session, Value},
};
use log::{debug, info};
use nu_ansi_term::{Color, Style};
use reedline::{DefaultHinter, FileBackedHistory, Reedline, Signal};
use std::{fs, path::PathBuf};

fn build_filesystem(seed: Option<PathBuf>) -> Result<MemoryFs> {
    match seed {
        Some(root) => {
            info!("seeding file system from {}", root.display());
            MemoryFs::seeded(&root)
        }
        None => Ok(MemoryFs::new()),
    }
}

fn print_value(value: &Value) {
    if !value.is_unspecified() {
        println!("{}", value);
    }
}

fn run_file(file: PathBuf, mut session: Session) -> Result<()> {
    let source = fs::read_to_string(file)?;
    let value = session.run_program(&source)?;
    print_value(&value);
    Ok(())
}

fn check_file(file: PathBuf) -> Result<()> {
    let source = fs::read_to_string(file)?;

    for form in parse_program(&source)? {
        debug!("{:?}", form);
        println!("{}", form);
    }

    Ok(())
}

fn run_repl(filesystem: MemoryFs, config: Config) -> Result<()> {
    let prompt = REPLPrompt::new(&filesystem.current_dir());
    let mut session = Session::new(Box::new(filesystem), Box::new(prompt.terminal()), config);

    let mut line_editor = Reedline::create()
        .with_hinter(Box::new(
            DefaultHinter::default().with_style(Style::new().italic().fg(Color::LightGray)),
        ))
        .with_highlighter(Box::new(SyntaxHighlighter))
        .with_validator(Box::new(REPLValidator));

    // Add file-backed history if possible
    if let Some(history) = home_dir()
        .map(|home| home.join(".ecmachine_history"))
        .and_then(|path| FileBackedHistory::with_file(100, path).ok())
        .map(Box::new)
    {
        line_editor = line_editor.with_history(history);
    } else {
        eprintln!("NOTE: Failed to load history. Persistence is now disabled.")
    }

    loop {
        match line_editor.read_line(&prompt)? {
            Signal::Success(buffer) => {
                if buffer.trim().is_empty() {
                    continue;
                }
                if let Some(value) = session.run_program(&buffer).report() {
                    print_value(&value);
                }
            }
            Signal::CtrlD | Signal::CtrlC => {
                break Ok(());
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config {
        max_depth: args.max_depth,
    };
    debug!("config: {:?}", config);

    let Some(filesystem) = build_filesystem(args.seed).report() else {
        return Ok(());
    };

    match args.command {
        Commands::Run { file } => {
            info!("FILE MODE");
            debug!("file: {:?}", file);

            let session = Session::new(Box::new(filesystem), Box::new(Headless), config);
            run_file(file, session).report();
        }
        Commands::Check { file } => {
            info!("CHECK MODE");
            debug!("file: {:?}", file);

            check_file(file).report();
        }
        Commands::Repl => {
            info!("REPL MODE");

            run_repl(filesystem, config).report();
        }
    }
    Ok(())
}
