//! The command shell: registry, dispatch and script replay.
//!
//! The shell is thin plumbing over the engine: it parses a line, checks the
//! registry, and maps outcomes to the fixed output tokens. Recoverable
//! failures are printed and the session continues; only backing-file errors
//! end it.

use crate::fs::FileSystem;
use crate::fs::error::FsError;
use crate::fs::inode::FileType;
use crate::fs::ops::FileInfo;
use crate::util;
use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;

/// One entry of the command registry.
struct Command {
    name: &'static str,
    /// Exact number of arguments the command takes.
    argc: usize,
    help: &'static str,
}

const COMMANDS: &[Command] = &[
    Command { name: "cp", argc: 2, help: "Copy file s1 to destination s2" },
    Command { name: "mv", argc: 2, help: "Move file s1 to s2, or rename s1 to s2" },
    Command { name: "rm", argc: 1, help: "Delete file s1" },
    Command { name: "mkdir", argc: 1, help: "Create directory a1" },
    Command { name: "rmdir", argc: 1, help: "Delete empty directory a1" },
    Command { name: "ls", argc: 1, help: "List the contents of directory a1" },
    Command { name: "cat", argc: 1, help: "Print the contents of file s1" },
    Command { name: "cd", argc: 1, help: "Change the working directory to a1" },
    Command { name: "pwd", argc: 0, help: "Print the working directory" },
    Command { name: "info", argc: 1, help: "Print inode and cluster details of s1/a1" },
    Command { name: "incp", argc: 2, help: "Copy host file s1 into the image at s2" },
    Command { name: "outcp", argc: 2, help: "Copy image file s1 out to host path s2" },
    Command { name: "load", argc: 1, help: "Execute commands from host file s1, one per line" },
    Command { name: "format", argc: 1, help: "Format the image to the given size, e.g. 600KB" },
    Command { name: "xcp", argc: 3, help: "Create file s3 as the concatenation of s1 and s2" },
    Command { name: "short", argc: 1, help: "Truncate file s1 to 5000 bytes if larger" },
];

/// Nesting allowed for `load` before a script chain is cut off.
const MAX_LOAD_DEPTH: u32 = 8;

/// Prints the registry as a help listing.
pub fn print_commands() {
    for cmd in COMMANDS {
        println!("{:<8}({})  {}", cmd.name, cmd.argc, cmd.help);
    }
}

fn print_command(name: &str) {
    if let Some(cmd) = COMMANDS.iter().find(|c| c.name == name) {
        println!("{:<8}({})  {}", cmd.name, cmd.argc, cmd.help);
    }
}

/// Executes one shell line against the engine.
///
/// Recoverable failures are reported on the spot; only an error of the
/// backing file itself propagates, and the caller must stop the session.
pub fn execute_line(fs: &mut FileSystem, line: &str, depth: u32) -> Result<(), io::Error> {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return Ok(());
    };
    let args: Vec<&str> = parts.collect();
    let Some(cmd) = COMMANDS.iter().find(|c| c.name == name) else {
        eprintln!("Invalid command!");
        print_commands();
        return Ok(());
    };
    if args.len() != cmd.argc {
        eprintln!("Invalid amount of arguments!");
        print_command(name);
        return Ok(());
    }
    if !fs.is_formatted() && !matches!(name, "format" | "load") {
        eprintln!("You must format the disk first!");
        print_command("format");
        return Ok(());
    }
    match run(fs, name, &args, depth) {
        Ok(true) => println!("OK"),
        Ok(false) => {}
        Err(FsError::Io(e)) => return Err(e),
        Err(e) => eprintln!("{e}"),
    }
    Ok(())
}

/// Runs a registered command. `Ok(true)` means `OK` is due on stdout.
fn run(fs: &mut FileSystem, name: &str, args: &[&str], depth: u32) -> Result<bool, FsError> {
    match name {
        "cp" => fs.cp(args[0], args[1]).map(|_| true),
        "mv" => fs.mv(args[0], args[1]).map(|_| true),
        "rm" => fs.rm(args[0]).map(|_| true),
        "mkdir" => fs.mkdir(args[0]).map(|_| true),
        "rmdir" => fs.rmdir(args[0]).map(|_| true),
        "ls" => {
            for (file_type, entry) in fs.ls(args[0])? {
                let tag = if file_type == FileType::Directory { '+' } else { '-' };
                println!("{tag}{entry}");
            }
            Ok(false)
        }
        "cat" => {
            let data = fs.cat(args[0])?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
            Ok(false)
        }
        "cd" => fs.cd(args[0]).map(|_| true),
        "pwd" => {
            println!("{}", fs.pwd()?);
            Ok(false)
        }
        "info" => {
            print_info(&fs.info(args[0])?);
            Ok(false)
        }
        "incp" => fs.incp(Path::new(args[0]), args[1]).map(|_| true),
        "outcp" => fs.outcp(args[0], Path::new(args[1])).map(|_| true),
        "load" => load(fs, Path::new(args[0]), depth).map(|_| true),
        "format" => {
            let size = util::parse_size(args[0]).ok_or(FsError::CannotCreateFile)?;
            fs.format(size).map(|_| true)
        }
        "xcp" => fs.xcp(args[0], args[1], args[2]).map(|_| true),
        "short" => fs.short(args[0]).map(|_| true),
        _ => unreachable!("registry and dispatch went out of sync"),
    }
}

fn print_info(info: &FileInfo) {
    let kind = match info.file_type {
        FileType::Directory => "directory",
        _ => "file",
    };
    println!("{}: inode {}, {}, {} B", info.name, info.inode, kind, info.file_size);
    println!("direct: {:?}", info.direct);
    println!("indirect: {:?}", info.indirect);
}

/// Replays the commands of a host file, one per line, with a banner around
/// the run. Usable before `format`, since the script may itself format.
fn load(fs: &mut FileSystem, path: &Path, depth: u32) -> Result<(), FsError> {
    if depth >= MAX_LOAD_DEPTH {
        eprintln!("load: scripts nested too deep, skipping {}", path.display());
        return Ok(());
    }
    let file = File::open(path).map_err(|_| FsError::FileNotFound)?;
    println!("--- load: {} ---", path.display());
    for line in BufReader::new(file).lines() {
        let line = line?;
        execute_line(fs, &line, depth + 1)?;
    }
    println!("--- load: done ---");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_fs() -> (FileSystem, NamedTempFile) {
        let img = NamedTempFile::new().unwrap();
        let fs = FileSystem::init(img.path()).unwrap();
        (fs, img)
    }

    #[test]
    fn lines_drive_the_engine() {
        let (mut fs, _img) = temp_fs();
        execute_line(&mut fs, "format 600KB", 0).unwrap();
        execute_line(&mut fs, "mkdir /a", 0).unwrap();
        execute_line(&mut fs, "mkdir /a/b", 0).unwrap();
        assert!(fs.ls("/a/b").is_ok());
    }

    #[test]
    fn bad_lines_do_not_stop_the_session() {
        let (mut fs, _img) = temp_fs();
        execute_line(&mut fs, "", 0).unwrap();
        execute_line(&mut fs, "frobnicate /x", 0).unwrap();
        execute_line(&mut fs, "mkdir", 0).unwrap();
        execute_line(&mut fs, "mkdir /a /b", 0).unwrap();
        // not formatted yet, so the engine never saw any of it
        assert!(!fs.is_formatted());
        execute_line(&mut fs, "mkdir /a", 0).unwrap();
        assert!(!fs.is_formatted());
    }

    #[test]
    fn load_replays_a_script() {
        let (mut fs, _img) = temp_fs();
        let mut script = NamedTempFile::new().unwrap();
        writeln!(script, "format 600KB").unwrap();
        writeln!(script, "mkdir /from-script").unwrap();
        writeln!(script).unwrap();
        writeln!(script, "mkdir /from-script").unwrap();
        script.flush().unwrap();
        let line = format!("load {}", script.path().display());
        execute_line(&mut fs, &line, 0).unwrap();
        assert!(fs.is_formatted());
        assert!(fs.ls("/from-script").is_ok());
    }

    #[test]
    fn load_of_a_missing_script_is_recoverable() {
        let (mut fs, _img) = temp_fs();
        execute_line(&mut fs, "load /no/such/script", 0).unwrap();
        assert!(!fs.is_formatted());
    }

    #[test]
    fn self_loading_scripts_terminate() {
        let (mut fs, _img) = temp_fs();
        let mut script = NamedTempFile::new().unwrap();
        let path = script.path().to_path_buf();
        writeln!(script, "load {}", path.display()).unwrap();
        script.flush().unwrap();
        execute_line(&mut fs, &format!("load {}", path.display()), 0).unwrap();
    }
}
