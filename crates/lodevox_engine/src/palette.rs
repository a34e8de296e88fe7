use rustc_hash::FxHashMap;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::block::BlockId;

/// Bits per stored cell index. Derived from the palette entry count and
/// never narrower than the count requires.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageWidth {
    /// 4 bits, two cells per byte.
    Nibble,
    /// 8 bits.
    Byte,
    /// 16 bits.
    Word,
}

impl StorageWidth {
    pub fn for_entry_count(count: usize) -> Self {
        if count <= 16 {
            StorageWidth::Nibble
        } else if count <= 256 {
            StorageWidth::Byte
        } else {
            StorageWidth::Word
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            StorageWidth::Nibble => 4,
            StorageWidth::Byte => 8,
            StorageWidth::Word => 16,
        }
    }

    pub fn max_index(self) -> usize {
        match self {
            StorageWidth::Nibble => 0xF,
            StorageWidth::Byte => 0xFF,
            StorageWidth::Word => 0xFFFF,
        }
    }
}

/// Packed per-cell palette indices at one of the three widths.
///
/// Nibble layout contract: cell `i` lives in byte `i / 2`; even cells
/// occupy the low nibble, odd cells the high nibble.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum IndexStore {
    Nibble(Vec<u8>),
    Byte(Vec<u8>),
    Word(Vec<u16>),
}

impl IndexStore {
    pub fn new(width: StorageWidth, cells: usize) -> Self {
        match width {
            StorageWidth::Nibble => IndexStore::Nibble(vec![0; cells.div_ceil(2)]),
            StorageWidth::Byte => IndexStore::Byte(vec![0; cells]),
            StorageWidth::Word => IndexStore::Word(vec![0; cells]),
        }
    }

    pub fn width(&self) -> StorageWidth {
        match self {
            IndexStore::Nibble(_) => StorageWidth::Nibble,
            IndexStore::Byte(_) => StorageWidth::Byte,
            IndexStore::Word(_) => StorageWidth::Word,
        }
    }

    pub fn get(&self, cell: usize) -> usize {
        match self {
            IndexStore::Nibble(bytes) => {
                let byte = bytes[cell / 2];
                if cell % 2 == 0 {
                    usize::from(byte & 0x0F)
                } else {
                    usize::from(byte >> 4)
                }
            }
            IndexStore::Byte(bytes) => usize::from(bytes[cell]),
            IndexStore::Word(words) => usize::from(words[cell]),
        }
    }

    pub fn set(&mut self, cell: usize, value: usize) {
        debug_assert!(
            value <= self.width().max_index(),
            "palette index {value} does not fit storage width {:?}",
            self.width()
        );

        match self {
            IndexStore::Nibble(bytes) => {
                let byte = &mut bytes[cell / 2];
                if cell % 2 == 0 {
                    *byte = (*byte & 0xF0) | (value as u8 & 0x0F);
                } else {
                    *byte = (*byte & 0x0F) | ((value as u8 & 0x0F) << 4);
                }
            }
            IndexStore::Byte(bytes) => bytes[cell] = value as u8,
            IndexStore::Word(words) => words[cell] = value as u16,
        }
    }

    /// Re-encodes every cell at a wider format. Data is always carried
    /// over cell by cell; a width change never truncates.
    pub fn resize_width(&mut self, width: StorageWidth, cells: usize) {
        if width == self.width() {
            return;
        }

        let mut replacement = IndexStore::new(width, cells);
        for cell in 0..cells {
            replacement.set(cell, self.get(cell));
        }
        *self = replacement;
    }

    /// Whether the backing buffer is sized for exactly `cells` cells.
    pub fn fits(&self, cells: usize) -> bool {
        match self {
            IndexStore::Nibble(bytes) => bytes.len() == cells.div_ceil(2),
            IndexStore::Byte(bytes) => bytes.len() == cells,
            IndexStore::Word(words) => words.len() == cells,
        }
    }

    pub fn fill(&mut self, value: usize, cells: usize) {
        debug_assert!(value <= self.width().max_index());
        match self {
            IndexStore::Nibble(bytes) => {
                let v = value as u8 & 0x0F;
                bytes.fill(v | (v << 4));
                // An odd cell count leaves the trailing high nibble unused.
                if cells % 2 == 1 {
                    if let Some(last) = bytes.last_mut() {
                        *last &= 0x0F;
                    }
                }
            }
            IndexStore::Byte(bytes) => bytes.fill(value as u8),
            IndexStore::Word(words) => words.fill(value as u16),
        }
    }
}

/// Per-chunk table of the block ids actually present in that chunk.
/// Entry 0 is always air; entries are append-only outside `optimize`.
#[derive(Clone, Debug)]
pub struct ChunkPalette {
    entries: Vec<BlockId>,
    index_of: FxHashMap<BlockId, usize>,
}

impl ChunkPalette {
    pub fn new() -> Self {
        let mut index_of = FxHashMap::default();
        index_of.insert(BlockId::AIR, 0);
        Self {
            entries: vec![BlockId::AIR],
            index_of,
        }
    }

    /// Local index for a block id, appending a new entry when absent.
    /// Callers must re-check `storage_width()` afterwards: appending may
    /// have crossed a width threshold.
    pub fn get_or_add_index(&mut self, block: BlockId) -> usize {
        if let Some(&index) = self.index_of.get(&block) {
            return index;
        }

        let index = self.entries.len();
        self.entries.push(block);
        self.index_of.insert(block, index);
        index
    }

    pub fn index_of(&self, block: BlockId) -> Option<usize> {
        self.index_of.get(&block).copied()
    }

    /// Reverse lookup. Indices outside the live entry range resolve to
    /// air rather than failing; stale indices can briefly exist while a
    /// caller applies an `optimize` remap.
    pub fn block_at(&self, index: usize) -> BlockId {
        self.entries.get(index).copied().unwrap_or(BlockId::AIR)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BlockId] {
        &self.entries
    }

    pub fn storage_width(&self) -> StorageWidth {
        StorageWidth::for_entry_count(self.entries.len())
    }

    /// Rebuilds the palette from a usage census, dropping entries with
    /// zero live references. Air stays at index 0 regardless of usage.
    /// Returns the old-index → new-index remap the caller must apply to
    /// every stored cell.
    pub fn optimize(&mut self, usage_counts: &[usize]) -> Vec<usize> {
        debug_assert_eq!(usage_counts.len(), self.entries.len());

        let mut remap = vec![0usize; self.entries.len()];
        let mut kept = vec![BlockId::AIR];

        for (old_index, &block) in self.entries.iter().enumerate().skip(1) {
            if usage_counts.get(old_index).copied().unwrap_or(0) > 0 {
                remap[old_index] = kept.len();
                kept.push(block);
            }
        }

        self.entries = kept;
        self.index_of.clear();
        for (index, &block) in self.entries.iter().enumerate() {
            self.index_of.insert(block, index);
        }

        remap
    }
}

impl Default for ChunkPalette {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for ChunkPalette {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChunkPalette {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<BlockId>::deserialize(deserializer)?;
        if entries.first() != Some(&BlockId::AIR) {
            return Err(de::Error::custom("palette entry 0 must be air"));
        }

        let mut index_of = FxHashMap::default();
        for (index, &block) in entries.iter().enumerate() {
            if index_of.insert(block, index).is_some() {
                return Err(de::Error::custom("palette contains a duplicate entry"));
            }
        }

        Ok(Self { entries, index_of })
    }
}

#[cfg(test)]
mod tests {
    use super::{ChunkPalette, IndexStore, StorageWidth};
    use crate::block::BlockId;

    #[test]
    fn storage_width_thresholds_match_entry_counts() {
        assert_eq!(StorageWidth::for_entry_count(1), StorageWidth::Nibble);
        assert_eq!(StorageWidth::for_entry_count(16), StorageWidth::Nibble);
        assert_eq!(StorageWidth::for_entry_count(17), StorageWidth::Byte);
        assert_eq!(StorageWidth::for_entry_count(256), StorageWidth::Byte);
        assert_eq!(StorageWidth::for_entry_count(257), StorageWidth::Word);
    }

    #[test]
    fn nibble_store_packs_two_cells_per_byte() {
        let mut store = IndexStore::new(StorageWidth::Nibble, 4);
        store.set(0, 0xA);
        store.set(1, 0x3);
        store.set(2, 0xF);

        let IndexStore::Nibble(bytes) = &store else {
            panic!("expected nibble store");
        };
        // Even cell in the low nibble, odd cell in the high nibble.
        assert_eq!(bytes[0], 0x3A);
        assert_eq!(bytes[1], 0x0F);

        assert_eq!(store.get(0), 0xA);
        assert_eq!(store.get(1), 0x3);
        assert_eq!(store.get(2), 0xF);
        assert_eq!(store.get(3), 0);
    }

    #[test]
    fn all_widths_round_trip_every_valid_index() {
        for width in [StorageWidth::Nibble, StorageWidth::Byte, StorageWidth::Word] {
            let cells = 64;
            let mut store = IndexStore::new(width, cells);
            for cell in 0..cells {
                let value = (cell * 7) % (width.max_index() + 1);
                store.set(cell, value);
            }
            for cell in 0..cells {
                let value = (cell * 7) % (width.max_index() + 1);
                assert_eq!(store.get(cell), value, "width {width:?} cell {cell}");
            }
        }
    }

    #[test]
    fn width_promotion_preserves_all_cells() {
        let cells = 33;
        let mut store = IndexStore::new(StorageWidth::Nibble, cells);
        for cell in 0..cells {
            store.set(cell, cell % 16);
        }

        store.resize_width(StorageWidth::Byte, cells);
        assert_eq!(store.width(), StorageWidth::Byte);
        for cell in 0..cells {
            assert_eq!(store.get(cell), cell % 16);
        }

        store.resize_width(StorageWidth::Word, cells);
        for cell in 0..cells {
            assert_eq!(store.get(cell), cell % 16);
        }
    }

    #[test]
    fn palette_starts_with_air_and_appends_in_order() {
        let mut palette = ChunkPalette::new();
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.block_at(0), BlockId::AIR);

        let stone = palette.get_or_add_index(BlockId(1));
        let dirt = palette.get_or_add_index(BlockId(2));
        assert_eq!(stone, 1);
        assert_eq!(dirt, 2);
        assert_eq!(palette.get_or_add_index(BlockId(1)), 1);
        assert_eq!(palette.block_at(2), BlockId(2));
        // Out-of-range indices read back as air, never panic.
        assert_eq!(palette.block_at(99), BlockId::AIR);
    }

    #[test]
    fn palette_width_grows_past_sixteen_entries() {
        let mut palette = ChunkPalette::new();
        for i in 1..16 {
            palette.get_or_add_index(BlockId(i));
        }
        assert_eq!(palette.storage_width(), StorageWidth::Nibble);

        palette.get_or_add_index(BlockId(16));
        assert_eq!(palette.len(), 17);
        assert_eq!(palette.storage_width(), StorageWidth::Byte);
    }

    #[test]
    fn optimize_drops_unused_entries_and_keeps_air_at_zero() {
        let mut palette = ChunkPalette::new();
        palette.get_or_add_index(BlockId(5)); // index 1
        palette.get_or_add_index(BlockId(7)); // index 2
        palette.get_or_add_index(BlockId(9)); // index 3

        // Index 2 is no longer referenced by any cell.
        let remap = palette.optimize(&[10, 4, 0, 2]);

        assert_eq!(palette.len(), 3);
        assert_eq!(palette.block_at(0), BlockId::AIR);
        assert_eq!(palette.block_at(1), BlockId(5));
        assert_eq!(palette.block_at(2), BlockId(9));
        assert_eq!(remap[0], 0);
        assert_eq!(remap[1], 1);
        assert_eq!(remap[3], 2);
        assert_eq!(palette.index_of(BlockId(7)), None);
    }

    #[test]
    fn palette_bincode_round_trip_rebuilds_reverse_index() {
        let mut palette = ChunkPalette::new();
        palette.get_or_add_index(BlockId(3));
        palette.get_or_add_index(BlockId(8));

        let encoded = bincode::serialize(&palette).expect("serialize palette");
        let decoded: ChunkPalette = bincode::deserialize(&encoded).expect("deserialize palette");

        assert_eq!(decoded.entries(), palette.entries());
        assert_eq!(decoded.index_of(BlockId(8)), Some(2));
    }
}
