//! The four dense score components and the cluster maps they read.

use serde::Serialize;
use std::ops::{Add, AddAssign, Index, IndexMut};

pub const NUM_COMPONENTS: usize = 4;

/// One language model of the feature, in score vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    CoarseLm100,
    CoarseLm1600,
    BiLmWithoutClustering,
    BiLmWithClustering,
}

impl Component {
    pub const ALL: [Component; NUM_COMPONENTS] = [
        Component::CoarseLm100,
        Component::CoarseLm1600,
        Component::BiLmWithoutClustering,
        Component::BiLmWithClustering,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Configuration key holding this component's model path.
    pub fn lm_key(self) -> &'static str {
        match self {
            Component::CoarseLm100 => "lmCoarseLM100",
            Component::CoarseLm1600 => "lmCoarseLM1600",
            Component::BiLmWithoutClustering => "biLMWithoutClustering",
            Component::BiLmWithClustering => "biLMWithClustering",
        }
    }

    /// Cluster maps needed to produce this component's tokens.
    pub fn required_maps(self) -> &'static [MapRole] {
        match self {
            Component::CoarseLm100 => &[MapRole::Target100],
            Component::CoarseLm1600 => &[MapRole::Target1600],
            Component::BiLmWithoutClustering => {
                &[MapRole::Source, MapRole::Target400, MapRole::BitokenToId]
            }
            Component::BiLmWithClustering => &[
                MapRole::Source,
                MapRole::Target400,
                MapRole::BitokenToId,
                MapRole::IdToCluster,
            ],
        }
    }

    pub fn is_bilingual(self) -> bool {
        matches!(
            self,
            Component::BiLmWithoutClustering | Component::BiLmWithClustering
        )
    }
}

/// Which cluster map a file plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapRole {
    Target100,
    Target1600,
    Target400,
    Source,
    BitokenToId,
    IdToCluster,
}

impl MapRole {
    pub const COUNT: usize = 6;

    pub const ALL: [MapRole; MapRole::COUNT] = [
        MapRole::Target100,
        MapRole::Target1600,
        MapRole::Target400,
        MapRole::Source,
        MapRole::BitokenToId,
        MapRole::IdToCluster,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Configuration key holding this map's path.
    pub fn key(self) -> &'static str {
        match self {
            MapRole::Target100 => "tgtWordToClusterId100",
            MapRole::Target1600 => "tgtWordToClusterId1600",
            MapRole::Target400 => "tgtWordToClusterId400",
            MapRole::Source => "srcWordToClusterId",
            MapRole::BitokenToId => "bitokenToBitokenId",
            MapRole::IdToCluster => "bitokenIdToClusterId",
        }
    }
}

/// Dense log10 scores, one slot per [`Component`]. Disabled components
/// stay at zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreVector(pub [f32; NUM_COMPONENTS]);

impl ScoreVector {
    pub fn as_array(&self) -> &[f32; NUM_COMPONENTS] {
        &self.0
    }

    pub fn total(&self) -> f32 {
        self.0.iter().sum()
    }
}

impl Index<Component> for ScoreVector {
    type Output = f32;

    fn index(&self, c: Component) -> &f32 {
        &self.0[c.index()]
    }
}

impl IndexMut<Component> for ScoreVector {
    fn index_mut(&mut self, c: Component) -> &mut f32 {
        &mut self.0[c.index()]
    }
}

impl AddAssign for ScoreVector {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

impl Add for ScoreVector {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}
