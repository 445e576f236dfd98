//! `blockfs` hosts a block-structured filesystem inside one regular file
//! and drives it with a line-oriented command shell.

use blockfs::fs::FileSystem;
use blockfs::prompt::prompt;
use blockfs::shell;
use std::env;
use std::path::PathBuf;
use std::process::exit;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// The name of the current program used in command line.
    prog: String,
    /// If true, print command line help.
    help: bool,
    /// The path to the backing image file.
    file: Option<PathBuf>,
}

fn parse_args() -> Args {
    let mut args: Args = Default::default();
    let mut iter = env::args();
    args.prog = iter.next().unwrap_or("blockfs".to_owned());
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => args.help = true,
            "-f" | "--file" => args.file = iter.next().map(PathBuf::from),
            _ => {}
        }
    }
    args
}

/// Prints command usage.
fn print_usage(prog: &str) {
    eprintln!("{prog}: bad usage");
    eprintln!("Try '{prog} --help' for more information.");
}

/// Prints command help.
fn print_help(prog: &str) {
    println!();
    println!("Usage:");
    println!(" {prog} --file <image>");
    println!();
    println!("Hosts a block filesystem inside the image file and reads commands");
    println!("from standard input, one per line. If the image does not exist or");
    println!("holds no filesystem yet, run `format` first.");
    println!();
    println!("Options:");
    println!(" -f, --file <image>\tPath to the backing image.");
    println!(" -h, --help\t\tPrints help.");
    println!();
    println!("Commands:");
    shell::print_commands();
}

fn main() {
    let args = parse_args();
    if args.help {
        print_help(&args.prog);
        exit(0);
    }
    let Some(file) = args.file else {
        print_usage(&args.prog);
        exit(1);
    };
    let mut fs = FileSystem::init(&file).unwrap_or_else(|e| {
        eprintln!("{}: {}: {e}", args.prog, file.display());
        exit(1);
    });
    while let Some(line) = prompt("> ") {
        if let Err(e) = shell::execute_line(&mut fs, &line, 0) {
            eprintln!("{}: {e}", args.prog);
            exit(1);
        }
    }
}
