//! Implementations of `tree` and `print`, plus the `help` banners shared by
//! the REPL dispatcher.

use std::io::Write;

use crate::blocks::collect_data_blocks;
use crate::error::CommandError;
use crate::image::Image;
use crate::metadata::{geometry, read_inode};
use crate::tree::Node;

/// Renders a 10-character permission string like `drwxr-xr-x`.
pub fn format_perm(mode: u16) -> String {
    const S_IFDIR: u16 = 0x4000;
    let mut buf = String::with_capacity(10);
    buf.push(if mode & S_IFDIR != 0 { 'd' } else { '-' });
    let rwx = [b'r', b'w', b'x'];
    for i in 0..9 {
        let bit = 1u16 << (8 - i);
        buf.push(if mode & bit != 0 { rwx[i % 3] as char } else { '-' });
    }
    buf
}

fn print_tree_recursive(
    image: &Image,
    n: &Node,
    prefix: &str,
    recursive: bool,
    show_size: bool,
    show_perm: bool,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let mut cur = n.first_child.as_deref();
    while let Some(c) = cur {
        let is_last = c.next_sibling.is_none();
        let branch = if is_last { "└" } else { "├" };

        match (show_perm, show_size) {
            (true, true) => {
                let ino = read_inode(image, c.inode_no)?;
                let perm = format_perm(ino.i_mode);
                let _ = writeln!(out, "{prefix}{branch} [{perm} {}] {}", ino.i_size, c.name);
            }
            (false, true) => {
                let ino = read_inode(image, c.inode_no)?;
                let _ = writeln!(out, "{prefix}{branch} [{}] {}", ino.i_size, c.name);
            }
            (true, false) => {
                let ino = read_inode(image, c.inode_no)?;
                let perm = format_perm(ino.i_mode);
                let _ = writeln!(out, "{prefix}{branch} [{perm}] {}", c.name);
            }
            (false, false) => {
                let _ = writeln!(out, "{prefix}{branch} {}", c.name);
            }
        }

        if recursive && c.is_dir() {
            let next_prefix = format!("{prefix}{}", if is_last { " " } else { "│ " });
            print_tree_recursive(image, c, &next_prefix, recursive, show_size, show_perm, out)?;
        }
        cur = c.next_sibling.as_deref();
    }
    Ok(())
}

/// `tree <PATH> [-r][-s][-p]`: the target itself has already been resolved
/// by the caller; this renders its header line, its children, and the
/// trailing directory/file summary.
pub fn command_tree(
    image: &Image,
    target: &Node,
    path: &str,
    recursive: bool,
    show_size: bool,
    show_perm: bool,
) -> Result<(), CommandError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let ino = read_inode(image, target.inode_no)?;
    let label = if path == "/" { "." } else { path };

    match (show_perm, show_size) {
        (true, true) => {
            let perm = format_perm(ino.i_mode);
            let _ = writeln!(out, "[{perm} {}] {label}", ino.i_size);
        }
        (true, false) => {
            let perm = format_perm(ino.i_mode);
            let _ = writeln!(out, "[{perm}] {label}");
        }
        (false, true) => {
            let _ = writeln!(out, "[{}] {label}", ino.i_size);
        }
        (false, false) => {
            let _ = writeln!(out, "{label}");
        }
    }

    print_tree_recursive(image, target, "", recursive, show_size, show_perm, &mut out)?;

    let (mut dirs, files) = target.count_tree(recursive);
    dirs += 1;
    let _ = writeln!(out, "\n{dirs} directories, {files} files\n");

    Ok(())
}

/// `print <PATH> [-n N]`: streams the file's data blocks as text, stopping
/// after `max_lines` completed lines when it is `Some`. Emits one extra
/// trailing newline iff the file has strictly more lines than were printed.
pub fn command_print(image: &Image, target: &Node, max_lines: Option<u32>) -> Result<(), CommandError> {
    let ino = read_inode(image, target.inode_no)?;
    let blocks = collect_data_blocks(image, &ino)?;
    let block_size = geometry().block_size as u64;

    let has_more = if let Some(max) = max_lines {
        let mut counted = 0u32;
        let mut found = false;
        'outer: for &block_no in &blocks {
            let mut buf = vec![0u8; block_size as usize];
            let got = image
                .read_at(&mut buf, block_no as u64 * block_size)
                .map_err(|e| CommandError::DataReadError(format!("reading file contents: {e}")))?;
            for &b in &buf[..got] {
                if b == b'\n' {
                    counted += 1;
                    if counted > max {
                        found = true;
                        break 'outer;
                    }
                }
            }
        }
        found
    } else {
        false
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut printed = 0u32;
    let mut line_buf: Vec<u8> = Vec::new();

    'blocks: for &block_no in &blocks {
        if let Some(max) = max_lines {
            if printed >= max {
                break;
            }
        }
        let mut buf = vec![0u8; block_size as usize];
        let got = image
            .read_at(&mut buf, block_no as u64 * block_size)
            .map_err(|e| CommandError::DataReadError(format!("reading file contents: {e}")))?;

        let mut pos = 0usize;
        while pos < got {
            if let Some(max) = max_lines {
                if printed >= max {
                    break 'blocks;
                }
            }
            match buf[pos..got].iter().position(|&b| b == b'\n') {
                Some(rel) => {
                    line_buf.extend_from_slice(&buf[pos..pos + rel + 1]);
                    let _ = out.write_all(&line_buf);
                    line_buf.clear();
                    printed += 1;
                    pos += rel + 1;
                }
                None => {
                    line_buf.extend_from_slice(&buf[pos..got]);
                    pos = got;
                }
            }
        }
    }

    if let Some(max) = max_lines {
        if printed == max && has_more {
            let _ = writeln!(out);
        }
    }

    Ok(())
}

pub fn help_tree() {
    println!("Usage :");
    println!("  > tree <PATH> [OPTION]... : display the directory structure if <PATH> is a directory");
    println!("    -r : display the directory structure recursively if <PATH> is a directory");
    println!("    -s : display the directory structure if <PATH> is a directory, including the size of each file");
    println!("    -p : display the directory structure if <PATH> is a directory, including the permissions of each directory and file");
}

pub fn help_print() {
    println!("Usage :");
    println!("  > print <PATH> [OPTION]... : print the contents on the standard output if <PATH> is a file");
    println!("    -n <line_number> : print only the first <line_number> lines of its contents on the standard output if <PATH> is file");
}

pub fn help_exit() {
    println!("Usage :");
    println!("  > exit : exit program");
}

pub fn help_help() {
    println!("Usage :");
    println!("  > help [COMMAND] : show commands for program");
}

pub fn help_all() {
    println!("Usage :");
    println!("  > tree <PATH> [OPTION]... : display the directory structure if <PATH> is a directory");
    println!("    -r : display the directory structure recursively if <PATH> is a directory");
    println!("    -s : display the directory structure if <PATH> is a directory, including the size of each file");
    println!("    -p : display the directory structure if <PATH> is a directory, including the permissions of each directory and file");
    println!("  > print <PATH> [OPTION]... : print the contents on the standard output if <PATH> is a file");
    println!("    -n <line_number> : print only the first <line_number> lines of its contents on the standard output if <PATH> is file");
    println!("  > help [COMMAND] : show commands for program");
    println!("  > exit : exit program");
}

pub fn command_help(cmd: Option<&str>) {
    match cmd {
        None => help_all(),
        Some("tree") => help_tree(),
        Some("print") => help_print(),
        Some("help") => help_help(),
        Some("exit") => help_exit(),
        Some(other) => {
            eprintln!("invalid command -- '{other}'");
            help_all();
        }
    }
}
