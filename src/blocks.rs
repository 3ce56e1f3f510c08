//! Enumerates every data block belonging to an inode: direct pointers plus
//! single/double/triple indirect levels, in on-disk order. Zero entries
//! (holes) are skipped rather than materialized, matching the block
//! resolver's unchanged semantics.

use crate::error::CommandError;
use crate::image::Image;
use crate::metadata::{geometry, Inode};

fn read_pointer_block(image: &Image, block_no: u32) -> Result<Vec<u32>, CommandError> {
    let block_size = geometry().block_size as usize;
    let off = block_no as u64 * block_size as u64;
    let mut raw = vec![0u8; block_size];
    image
        .read_exact_at(&mut raw, off)
        .map_err(|e| CommandError::DataReadError(format!("reading indirect block {block_no}: {e}")))?;
    Ok(raw
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Returns every non-hole data block number referenced by `inode`, in
/// direct-then-single-then-double-then-triple order.
pub fn collect_data_blocks(image: &Image, inode: &Inode) -> Result<Vec<u32>, CommandError> {
    let mut blocks = Vec::new();

    for &b in &inode.i_block[0..12] {
        if b != 0 {
            blocks.push(b);
        }
    }

    let single = inode.i_block[12];
    if single != 0 {
        for b in read_pointer_block(image, single)? {
            if b != 0 {
                blocks.push(b);
            }
        }
    }

    let double = inode.i_block[13];
    if double != 0 {
        for ind in read_pointer_block(image, double)? {
            if ind == 0 {
                continue;
            }
            for b in read_pointer_block(image, ind)? {
                if b != 0 {
                    blocks.push(b);
                }
            }
        }
    }

    let triple = inode.i_block[14];
    if triple != 0 {
        for dbl in read_pointer_block(image, triple)? {
            if dbl == 0 {
                continue;
            }
            for ind in read_pointer_block(image, dbl)? {
                if ind == 0 {
                    continue;
                }
                for b in read_pointer_block(image, ind)? {
                    if b != 0 {
                        blocks.push(b);
                    }
                }
            }
        }
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[test]
    fn direct_blocks_skip_holes() {
        let mut ino: Inode = Zeroable::zeroed();
        ino.i_block[0] = 5;
        ino.i_block[1] = 0;
        ino.i_block[2] = 7;
        let direct: Vec<u32> = ino.i_block[0..12].iter().copied().filter(|&b| b != 0).collect();
        assert_eq!(direct, vec![5, 7]);
    }
}
