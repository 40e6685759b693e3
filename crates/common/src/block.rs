use serde::{Deserialize, Serialize};

/// Material of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockType {
    Air,
    Grass,
    Dirt,
    Stone,
    Sand,
    Water,
    Wood,
    Leaves,
    Glass,
    Brick,
}

impl BlockType {
    pub const ALL: [BlockType; 10] = [
        BlockType::Air,
        BlockType::Grass,
        BlockType::Dirt,
        BlockType::Stone,
        BlockType::Sand,
        BlockType::Water,
        BlockType::Wood,
        BlockType::Leaves,
        BlockType::Glass,
        BlockType::Brick,
    ];

    /// Base hit points for a freshly created block. `None` for air (no record)
    /// and water (never destroyed by damage).
    pub fn base_max_hp(self) -> Option<f32> {
        match self {
            BlockType::Air | BlockType::Water => None,
            BlockType::Grass => Some(30.0),
            BlockType::Dirt => Some(30.0),
            BlockType::Sand => Some(20.0),
            BlockType::Leaves => Some(10.0),
            BlockType::Glass => Some(15.0),
            BlockType::Wood => Some(60.0),
            BlockType::Stone => Some(100.0),
            BlockType::Brick => Some(120.0),
        }
    }

    /// Fraction of light a ray keeps when passing through. 0 is opaque.
    pub fn translucency(self) -> f32 {
        match self {
            BlockType::Air => 1.0,
            BlockType::Glass => 0.9,
            BlockType::Water => 0.7,
            BlockType::Leaves => 0.4,
            _ => 0.0,
        }
    }

    /// Blocks that may be damaged and that take part in gravity settlement.
    pub fn is_structural(self) -> bool {
        !matches!(self, BlockType::Air | BlockType::Water)
    }
}

/// Facing of a placed block, kept for presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

/// Hit points of a solid block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Durability {
    /// `0 <= hp <= max_hp` is maintained by every mutation.
    Finite { hp: f32, max_hp: f32 },
    /// Water: never depleted by damage, only removed by type replacement.
    Unbounded,
}

impl Durability {
    pub fn for_type(kind: BlockType) -> Self {
        match kind.base_max_hp() {
            Some(max_hp) => Durability::Finite { hp: max_hp, max_hp },
            None => Durability::Unbounded,
        }
    }

    /// Apply damage and report whether the block is now depleted.
    ///
    /// The amount must already be finite and positive; the caller filters.
    fn apply(&mut self, amount: f32) -> bool {
        match self {
            Durability::Finite { hp, max_hp } => {
                *hp = (*hp - amount).clamp(0.0, *max_hp);
                *hp <= 0.0
            }
            Durability::Unbounded => false,
        }
    }
}

/// Per-cell record for every non-air cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolidBlock {
    pub kind: BlockType,
    pub durability: Durability,
    pub orientation: Orientation,
    pub player_placed: bool,
    pub lit: bool,
    pub translucency: f32,
}

impl SolidBlock {
    pub fn hp(&self) -> Option<f32> {
        match self.durability {
            Durability::Finite { hp, .. } => Some(hp),
            Durability::Unbounded => None,
        }
    }

    pub fn max_hp(&self) -> Option<f32> {
        match self.durability {
            Durability::Finite { max_hp, .. } => Some(max_hp),
            Durability::Unbounded => None,
        }
    }

    /// Returns true when the hit points reached zero.
    pub fn damage(&mut self, amount: f32) -> bool {
        if !amount.is_finite() || amount <= 0.0 {
            return false;
        }
        self.durability.apply(amount)
    }

    pub fn is_opaque(&self) -> bool {
        self.translucency <= 0.0
    }
}

/// A grid cell: the air sentinel or a solid record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Block {
    #[default]
    Air,
    Solid(SolidBlock),
}

impl Block {
    /// Build a fresh block of the given type with full durability, unlit.
    pub fn new(kind: BlockType, player_placed: bool) -> Self {
        if kind == BlockType::Air {
            return Block::Air;
        }
        Block::Solid(SolidBlock {
            kind,
            durability: Durability::for_type(kind),
            orientation: Orientation::default(),
            player_placed,
            lit: false,
            translucency: kind.translucency().clamp(0.0, 1.0),
        })
    }

    pub fn kind(&self) -> BlockType {
        match self {
            Block::Air => BlockType::Air,
            Block::Solid(s) => s.kind,
        }
    }

    pub fn is_air(&self) -> bool {
        matches!(self, Block::Air)
    }

    pub fn is_water(&self) -> bool {
        self.kind() == BlockType::Water
    }

    /// Non-air, non-water.
    pub fn is_structural(&self) -> bool {
        self.kind().is_structural()
    }

    pub fn is_lit(&self) -> bool {
        matches!(self, Block::Solid(s) if s.lit)
    }

    pub fn solid(&self) -> Option<&SolidBlock> {
        match self {
            Block::Air => None,
            Block::Solid(s) => Some(s),
        }
    }

    pub fn solid_mut(&mut self) -> Option<&mut SolidBlock> {
        match self {
            Block::Air => None,
            Block::Solid(s) => Some(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn air_is_the_sentinel() {
        assert_eq!(Block::new(BlockType::Air, true), Block::Air);
        assert!(Block::default().is_air());
        assert_eq!(Block::Air.kind(), BlockType::Air);
    }

    #[test]
    fn fresh_block_has_full_hp() {
        let b = Block::new(BlockType::Stone, false);
        let s = b.solid().unwrap();
        assert_eq!(s.hp(), s.max_hp());
        assert_eq!(s.hp(), Some(100.0));
        assert!(!s.lit);
        assert!(s.is_opaque());
    }

    #[test]
    fn water_is_unbounded() {
        let mut b = Block::new(BlockType::Water, false);
        let s = b.solid_mut().unwrap();
        assert_eq!(s.durability, Durability::Unbounded);
        assert!(!s.damage(1.0e9));
        assert!(!b.is_structural());
    }

    #[test]
    fn damage_clamps_to_zero() {
        let mut b = Block::new(BlockType::Sand, false);
        let s = b.solid_mut().unwrap();
        assert!(!s.damage(5.0));
        assert_eq!(s.hp(), Some(15.0));
        assert!(s.damage(500.0));
        assert_eq!(s.hp(), Some(0.0));
    }

    #[test]
    fn malformed_damage_is_ignored() {
        let mut b = Block::new(BlockType::Dirt, false);
        let s = b.solid_mut().unwrap();
        assert!(!s.damage(f32::NAN));
        assert!(!s.damage(f32::INFINITY));
        assert!(!s.damage(-3.0));
        assert_eq!(s.hp(), Some(30.0));
    }

    #[test]
    fn translucency_in_unit_range() {
        for kind in BlockType::ALL {
            let t = kind.translucency();
            assert!((0.0..=1.0).contains(&t), "{kind:?}");
        }
    }
}
