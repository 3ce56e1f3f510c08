//! On-disk metadata structures and the decoder that turns raw bytes from the
//! image into them.
//!
//! Every struct here is `#[repr(C)]` and derives `bytemuck::Pod`, so a block
//! of bytes read straight off the image can be reinterpreted in place with
//! [`bytemuck::from_bytes`] — no field-by-field parsing, no `unsafe`. `Pod`
//! requires the type to have no implicit padding, so each struct below is
//! laid out so every multi-byte field already falls on a naturally aligned
//! offset; where the on-disk layout leaves a gap we fill it with an explicit
//! reserved field rather than relying on the compiler to insert one.

use std::mem::size_of;
use std::sync::OnceLock;

use bytemuck::{Pod, Zeroable};

use crate::error::CommandError;
use crate::image::Image;

pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const EXT2_MAGIC: u16 = 0xEF53;
pub const ROOT_INODE: u32 = 2;

pub const FT_DIR: u8 = 2;

/// The fields of `struct ext2_super_block` this reader consumes, laid out at
/// their real on-disk offsets. `s_magic` sits at byte 56, `s_inode_size` at
/// byte 88; `_reserved` makes the struct's size a multiple of its 4-byte
/// alignment without leaving unaccounted padding for `Pod` to reject.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Superblock {
    pub s_inodes_count: u32,
    pub s_blocks_count: u32,
    pub s_r_blocks_count: u32,
    pub s_free_blocks_count: u32,
    pub s_free_inodes_count: u32,
    pub s_first_data_block: u32,
    pub s_log_block_size: u32,
    pub s_log_frag_size: u32,
    pub s_blocks_per_group: u32,
    pub s_frags_per_group: u32,
    pub s_inodes_per_group: u32,
    pub s_mtime: u32,
    pub s_wtime: u32,
    pub s_mnt_count: u16,
    pub s_max_mnt_count: i16,
    pub s_magic: u16,
    pub s_state: u16,
    pub s_errors: u16,
    pub s_minor_rev_level: u16,
    pub s_lastcheck: u32,
    pub s_checkinterval: u32,
    pub s_creator_os: u32,
    pub s_rev_level: u32,
    pub s_def_resuid: u16,
    pub s_def_resgid: u16,
    pub s_first_ino: u32,
    pub s_inode_size: u16,
    _reserved: u16,
}

impl Superblock {
    /// Decoded block size in bytes: `1024 << s_log_block_size`.
    pub fn block_size(&self) -> u32 {
        1024u32 << self.s_log_block_size
    }
}

/// `struct ext2_group_desc`, 32 bytes, no padding needed: every field
/// already lands on a 2- or 4-byte boundary.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GroupDescriptor {
    pub bg_block_bitmap: u32,
    pub bg_inode_bitmap: u32,
    pub bg_inode_table: u32,
    pub bg_free_blocks_count: u16,
    pub bg_free_inodes_count: u16,
    pub bg_used_dirs_count: u16,
    pub bg_pad: u16,
    pub bg_reserved: [u32; 3],
}

/// `struct ext2_inode`, truncated at the end of `i_block` (offset 100) —
/// the fields beyond it (generation, acl, fragment address) are never
/// consulted by this reader, matching the on-disk struct this was
/// ported from.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Inode {
    pub i_mode: u16,
    pub i_uid: u16,
    pub i_size: u32,
    pub i_atime: u32,
    pub i_ctime: u32,
    pub i_mtime: u32,
    pub i_dtime: u32,
    pub i_gid: u16,
    pub i_links_count: u16,
    pub i_blocks: u32,
    pub i_flags: u32,
    pub osd1: u32,
    pub i_block: [u32; 15],
}

impl Inode {
    pub fn is_dir(&self) -> bool {
        self.i_mode & 0xF000 == 0x4000
    }
}

/// Process-wide, read-only-after-init filesystem geometry. Populated once at
/// startup from the superblock; every later layer reads through this
/// instead of threading the superblock down every call.
#[derive(Debug)]
pub struct Geometry {
    pub block_size: u32,
    pub inode_size: u32,
    pub inodes_per_group: u32,
    pub blocks_per_group: u32,
    pub first_data_block: u32,
}

static GEOMETRY: OnceLock<Geometry> = OnceLock::new();

/// Returns the geometry singleton. Panics if [`load_superblock`] has not run
/// yet — every entry point calls it before touching any other module.
pub fn geometry() -> &'static Geometry {
    GEOMETRY.get().expect("geometry read before superblock load")
}

/// Reads and validates the superblock, initializing the geometry singleton.
/// Returns the decoded superblock so the caller can also read group
/// descriptors without re-deriving the block size.
pub fn load_superblock(image: &Image) -> Result<Superblock, CommandError> {
    let mut buf = [0u8; size_of::<Superblock>()];
    image
        .read_exact_at(&mut buf, SUPERBLOCK_OFFSET)
        .map_err(|e| CommandError::DataReadError(format!("reading superblock: {e}")))?;
    let sb: Superblock = *bytemuck::from_bytes(&buf);

    if sb.s_magic != EXT2_MAGIC {
        return Err(CommandError::DataReadError(format!(
            "bad ext2 magic: expected {EXT2_MAGIC:#06x}, got {:#06x}",
            sb.s_magic
        )));
    }

    let inode_size = if sb.s_inode_size == 0 {
        128
    } else {
        sb.s_inode_size as u32
    };

    let _ = GEOMETRY.set(Geometry {
        block_size: sb.block_size(),
        inode_size,
        inodes_per_group: sb.s_inodes_per_group,
        blocks_per_group: sb.s_blocks_per_group,
        first_data_block: sb.s_first_data_block,
    });

    Ok(sb)
}

/// Reads group descriptor `group`. The group descriptor table starts
/// immediately after the block containing the superblock.
pub fn load_group_desc(image: &Image, group: u32) -> Result<GroupDescriptor, CommandError> {
    let geo = geometry();
    let gdt_block = if geo.block_size == 1024 { 2 } else { 1 };
    let off = gdt_block as u64 * geo.block_size as u64
        + group as u64 * size_of::<GroupDescriptor>() as u64;

    let mut buf = [0u8; size_of::<GroupDescriptor>()];
    image
        .read_exact_at(&mut buf, off)
        .map_err(|e| CommandError::DataReadError(format!("reading group descriptor {group}: {e}")))?;
    Ok(*bytemuck::from_bytes(&buf))
}

/// Reads inode `ino` (1-indexed, per ext2 convention) out of the inode table
/// described by `gd`.
pub fn load_inode(image: &Image, gd: &GroupDescriptor, ino: u32) -> Result<Inode, CommandError> {
    let geo = geometry();
    let index_in_group = (ino - 1) % geo.inodes_per_group;
    let off = gd.bg_inode_table as u64 * geo.block_size as u64
        + index_in_group as u64 * geo.inode_size as u64;

    // Read exactly one stride's worth even if inode_size exceeds our struct;
    // we only care about the leading `size_of::<Inode>()` bytes of it.
    let mut raw = vec![0u8; geo.inode_size as usize];
    image
        .read_exact_at(&mut raw, off)
        .map_err(|e| CommandError::DataReadError(format!("reading inode {ino}: {e}")))?;
    Ok(*bytemuck::from_bytes(&raw[..size_of::<Inode>()]))
}

/// Convenience wrapper over `load_group_desc` + `load_inode`: resolves
/// `ino`'s block group from the geometry singleton and reads it in one
/// call, matching the original reader's per-call inode lookup instead of
/// threading a cached group descriptor through every caller.
pub fn read_inode(image: &Image, ino: u32) -> Result<Inode, CommandError> {
    let geo = geometry();
    let group = (ino - 1) / geo.inodes_per_group;
    let gd = load_group_desc(image, group)?;
    load_inode(image, &gd, ino)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superblock_size_is_pod_safe() {
        assert_eq!(size_of::<Superblock>() % 4, 0);
    }

    #[test]
    fn block_size_decodes_log2() {
        let mut sb: Superblock = Zeroable::zeroed();
        sb.s_log_block_size = 0;
        assert_eq!(sb.block_size(), 1024);
        sb.s_log_block_size = 2;
        assert_eq!(sb.block_size(), 4096);
    }

    #[test]
    fn inode_mode_detects_directory() {
        let mut ino: Inode = Zeroable::zeroed();
        ino.i_mode = 0x4000 | 0o755;
        assert!(ino.is_dir());
        ino.i_mode = 0x8000 | 0o644;
        assert!(!ino.is_dir());
    }

    #[test]
    fn group_descriptor_is_32_bytes() {
        assert_eq!(size_of::<GroupDescriptor>(), 32);
    }
}
