//! The interactive command loop: tokenizes one line of input at a time and
//! dispatches to `tree`, `print`, `help`, or `exit`.

use std::io::{self, Write};

use crate::commands::{command_help, command_print, command_tree, help_print, help_tree};
use crate::error::CommandError;
use crate::image::Image;
use crate::tree::{find_node, validate_path, Node};

const PROMPT: &str = "20211519> ";

/// Parsed `tree` flags: `-r`/`-s`/`-p`, combinable in one token (`-rsp`),
/// each rejected if repeated.
#[derive(Default)]
struct TreeFlags {
    recursive: bool,
    show_size: bool,
    show_perm: bool,
}

fn parse_tree_args(tokens: &[&str]) -> Result<(TreeFlags, Option<String>), CommandError> {
    let mut flags = TreeFlags::default();
    let mut path = None;

    for tok in tokens {
        if let Some(opts) = tok.strip_prefix('-') {
            for ch in opts.chars() {
                match ch {
                    'r' if !flags.recursive => flags.recursive = true,
                    's' if !flags.show_size => flags.show_size = true,
                    'p' if !flags.show_perm => flags.show_perm = true,
                    _ => return Err(CommandError::UsageError(format!("unknown or repeated flag in '{tok}'"))),
                }
            }
        } else if path.is_none() {
            path = Some((*tok).to_string());
        } else {
            return Err(CommandError::UsageError(format!("unexpected extra argument '{tok}'")));
        }
    }

    Ok((flags, path))
}

enum PrintArgs {
    Ok { path: String, max_lines: Option<u32> },
    ZeroLines,
    MissingArg,
}

fn parse_print_args(tokens: &[&str]) -> Result<PrintArgs, CommandError> {
    let mut path: Option<String> = None;
    let mut has_n = false;
    let mut n: u32 = 0;

    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];
        if tok == "-n" {
            has_n = true;
            i += 1;
            let Some(arg) = tokens.get(i) else {
                return Ok(PrintArgs::MissingArg);
            };
            // Mirrors `atoi`: a token that isn't a valid integer parses as 0
            // rather than raising an error.
            let Ok(raw) = arg.parse::<i64>() else {
                return Ok(PrintArgs::ZeroLines);
            };
            if raw < 0 {
                return Err(CommandError::BadArgument(format!("invalid number of lines: {raw}")));
            }
            if raw == 0 {
                return Ok(PrintArgs::ZeroLines);
            }
            n = raw as u32;
        } else if path.is_none() {
            path = Some(tok.to_string());
        } else {
            return Err(CommandError::UsageError(format!("unexpected extra argument '{tok}'")));
        }
        i += 1;
    }

    let Some(path) = path else {
        return Err(CommandError::UsageError("print requires a <PATH>".into()));
    };

    Ok(PrintArgs::Ok {
        path,
        max_lines: if has_n { Some(n) } else { None },
    })
}

/// Runs the REPL until `exit` or EOF on stdin.
pub fn run(image: &Image, root: &Node) -> io::Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("{PROMPT}");
        io::stdout().flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((cmd, rest)) = tokens.split_first() else {
            continue;
        };

        match *cmd {
            "tree" => dispatch_tree(image, root, rest),
            "print" => dispatch_print(image, root, rest),
            "help" => command_help(rest.first().copied()),
            "exit" => break,
            _ => command_help(None),
        }
    }

    Ok(())
}

fn dispatch_tree(image: &Image, root: &Node, rest: &[&str]) {
    let (flags, path) = match parse_tree_args(rest) {
        Ok(v) => v,
        Err(_) => {
            help_tree();
            return;
        }
    };
    let path = path.unwrap_or_else(|| ".".to_string());

    if let Err(e) = validate_path(&path) {
        eprintln!("{e}");
        return;
    }

    let Some(target) = find_node(root, &path) else {
        eprintln!("{}", CommandError::NotFound(path.clone()));
        help_tree();
        return;
    };

    if !target.is_dir() {
        eprintln!("{}", CommandError::WrongType(format!("'{path}' is not directory")));
        return;
    }

    if let Err(e) = command_tree(image, target, &path, flags.recursive, flags.show_size, flags.show_perm) {
        eprintln!("{e}");
    }
}

fn dispatch_print(image: &Image, root: &Node, rest: &[&str]) {
    let parsed = match parse_print_args(rest) {
        Ok(v) => v,
        Err(CommandError::BadArgument(msg)) => {
            eprintln!("print: {msg}");
            return;
        }
        Err(_) => {
            help_print();
            return;
        }
    };

    let (path, max_lines) = match parsed {
        PrintArgs::Ok { path, max_lines } => (path, max_lines),
        PrintArgs::ZeroLines => return,
        PrintArgs::MissingArg => {
            eprintln!("print: option requires an argument -- 'n'\n");
            return;
        }
    };

    if let Err(e) = validate_path(&path) {
        eprintln!("{e}");
        return;
    }

    let Some(target) = find_node(root, &path) else {
        eprintln!("{}", CommandError::NotFound(path.clone()));
        help_print();
        return;
    };

    if target.is_dir() {
        eprintln!("{}\n", CommandError::WrongType(format!("'{path}' is not file")));
        return;
    }

    if let Err(e) = command_print(image, target, max_lines) {
        eprintln!("{e}");
    }
}
