mod blocks;
mod commands;
mod error;
mod image;
mod metadata;
mod repl;
mod tree;

use std::path::PathBuf;

use anyhow::{bail, Context};
use argh::FromArgs;

use image::Image;
use metadata::{load_superblock, read_inode, ROOT_INODE};
use tree::Node;

/// Read-only ext2 filesystem reader and interactive navigation shell.
#[derive(FromArgs)]
struct Args {
    /// path to the ext2 disk image
    #[argh(positional)]
    image: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    let image = Image::open(&args.image)
        .with_context(|| format!("opening image {}", args.image.display()))?;

    load_superblock(&image).map_err(|e| anyhow::anyhow!("{e}"))?;

    let root_inode = read_inode(&image, ROOT_INODE).map_err(|e| anyhow::anyhow!("{e}"))?;

    if !root_inode.is_dir() {
        bail!("root inode {ROOT_INODE} is not a directory");
    }

    let mut root = Node::new("/", ROOT_INODE, metadata::FT_DIR);
    tree::build_tree(&image, &mut root).map_err(|e| anyhow::anyhow!("{e}"))?;

    repl::run(&image, &root)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use tempfile::NamedTempFile;

    use crate::image::Image;
    use crate::metadata::{self, read_inode, ROOT_INODE};
    use crate::tree::{self, find_node, Node};

    const BLOCK_SIZE: u32 = 1024;
    const INODE_SIZE: u16 = 128;
    const INODES_PER_GROUP: u32 = 32;

    /// Writes a directory entry at `buf[off..]` with an explicit `rec_len`
    /// (the last entry of a block stretches its `rec_len` to the block's
    /// end, per ext2 convention).
    fn write_dirent(buf: &mut [u8], off: usize, inode: u32, rec_len: u16, name: &str, file_type: u8) {
        let name_bytes = name.as_bytes();
        buf[off..off + 4].copy_from_slice(&inode.to_ne_bytes());
        buf[off + 4..off + 6].copy_from_slice(&rec_len.to_ne_bytes());
        buf[off + 6] = name_bytes.len() as u8;
        buf[off + 7] = file_type;
        buf[off + 8..off + 8 + name_bytes.len()].copy_from_slice(name_bytes);
    }

    /// Writes a whole block of directory entries, each sized to its own
    /// `8 + name.len()` except the last, which is stretched to fill the
    /// block.
    fn write_dirent_block(block: &mut [u8], entries: &[(u32, &str, u8)]) {
        let mut off = 0usize;
        for (i, (inode, name, file_type)) in entries.iter().enumerate() {
            let tight_len = 8 + name.len();
            let rec_len = if i + 1 == entries.len() {
                block.len() - off
            } else {
                tight_len
            };
            write_dirent(block, off, *inode, rec_len as u16, name, *file_type);
            off += tight_len;
        }
    }

    /// Builds a 1 MiB ext2 image with a root directory containing
    /// subdirectory `d/`, which contains file `a.txt` with contents
    /// `"hello\nworld\n"`.
    fn build_fixture() -> NamedTempFile {
        const ROOT_DATA_BLOCK: u32 = 9;
        const D_DATA_BLOCK: u32 = 10;
        const A_TXT_DATA_BLOCK: u32 = 11;
        const D_INODE: u32 = 11;
        const A_TXT_INODE: u32 = 12;

        let mut disk = vec![0u8; 1024 * 1024];

        // Superblock at offset 1024.
        let sb_off = 1024usize;
        let put_u32 = |disk: &mut [u8], off: usize, v: u32| disk[off..off + 4].copy_from_slice(&v.to_ne_bytes());
        let put_u16 = |disk: &mut [u8], off: usize, v: u16| disk[off..off + 2].copy_from_slice(&v.to_ne_bytes());

        put_u32(&mut disk, sb_off, 32); // s_inodes_count
        put_u32(&mut disk, sb_off + 4, 1024); // s_blocks_count
        put_u32(&mut disk, sb_off + 20, 1); // s_first_data_block
        put_u32(&mut disk, sb_off + 24, 0); // s_log_block_size -> 1024
        put_u32(&mut disk, sb_off + 32, 8192); // s_blocks_per_group
        put_u32(&mut disk, sb_off + 40, INODES_PER_GROUP);
        put_u16(&mut disk, sb_off + 56, metadata::EXT2_MAGIC);
        put_u16(&mut disk, sb_off + 88, INODE_SIZE);

        // Group descriptor table at block 2.
        let gd_off = 2 * BLOCK_SIZE as usize;
        const INODE_TABLE_BLOCK: u32 = 5;
        put_u32(&mut disk, gd_off + 8, INODE_TABLE_BLOCK); // bg_inode_table

        // Inode table starts at block 5, INODE_SIZE-byte stride.
        let inode_off = |ino: u32| {
            INODE_TABLE_BLOCK as usize * BLOCK_SIZE as usize
                + (ino as usize - 1) * INODE_SIZE as usize
        };
        let write_inode = |disk: &mut [u8], ino: u32, mode: u16, size: u32, direct0: u32| {
            let off = inode_off(ino);
            put_u16(disk, off, mode);
            put_u32(disk, off + 4, size);
            put_u32(disk, off + 40, direct0); // i_block[0]
        };

        const S_IFDIR: u16 = 0x4000;
        const S_IFREG: u16 = 0x8000;
        write_inode(&mut disk, ROOT_INODE, S_IFDIR | 0o755, BLOCK_SIZE, ROOT_DATA_BLOCK);
        write_inode(&mut disk, D_INODE, S_IFDIR | 0o755, BLOCK_SIZE, D_DATA_BLOCK);
        write_inode(&mut disk, A_TXT_INODE, S_IFREG | 0o644, 12, A_TXT_DATA_BLOCK);

        // Root directory block: ".", "..", "d".
        {
            let base = ROOT_DATA_BLOCK as usize * BLOCK_SIZE as usize;
            let block = &mut disk[base..base + BLOCK_SIZE as usize];
            write_dirent_block(
                block,
                &[(ROOT_INODE, ".", 2), (ROOT_INODE, "..", 2), (D_INODE, "d", 2)],
            );
        }

        // "d" directory block: ".", "..", "a.txt".
        {
            let base = D_DATA_BLOCK as usize * BLOCK_SIZE as usize;
            let block = &mut disk[base..base + BLOCK_SIZE as usize];
            write_dirent_block(
                block,
                &[(D_INODE, ".", 2), (ROOT_INODE, "..", 2), (A_TXT_INODE, "a.txt", 1)],
            );
        }

        // "a.txt" contents.
        {
            let base = A_TXT_DATA_BLOCK as usize * BLOCK_SIZE as usize;
            disk[base..base + 12].copy_from_slice(b"hello\nworld\n");
        }

        let mut file = NamedTempFile::new().expect("create temp file");
        file.write_all(&disk).expect("write fixture");
        file
    }

    #[test]
    fn loads_superblock_and_builds_namespace_tree() {
        let fixture = build_fixture();
        let image = Image::open(fixture.path()).expect("open fixture");
        metadata::load_superblock(&image).expect("load superblock");

        let root_inode = read_inode(&image, ROOT_INODE).expect("read root inode");
        assert!(root_inode.is_dir());

        let mut root = Node::new("/", ROOT_INODE, metadata::FT_DIR);
        tree::build_tree(&image, &mut root).expect("build tree");

        let d = find_node(&root, "d").expect("find d");
        assert!(d.is_dir());
        let a_txt = find_node(&root, "d/a.txt").expect("find d/a.txt");
        assert!(!a_txt.is_dir());

        assert!(find_node(&root, "lost+found").is_none());

        let (dirs, files) = root.count_tree(true);
        assert_eq!((dirs, files), (1, 1));
    }
}
