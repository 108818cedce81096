//! Pipeline stages and the per-function active stage mask.
//!
//! Stages are totally ordered; the "none" sentinel of a stage-less value
//! (a literal) is `Option<Stage>::None`, which orders before every stage.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Host = 0,
    Vertex,
    Control,
    Evaluation,
    Geometry,
    Fragment,
}

pub const STAGE_COUNT: usize = 6;

impl Stage {
    pub const ALL: [Stage; STAGE_COUNT] = [
        Stage::Host,
        Stage::Vertex,
        Stage::Control,
        Stage::Evaluation,
        Stage::Geometry,
        Stage::Fragment,
    ];

    /// Every stage that runs on the device.
    pub const DEVICE: [Stage; 5] = [
        Stage::Vertex,
        Stage::Control,
        Stage::Evaluation,
        Stage::Geometry,
        Stage::Fragment,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Host => "host",
            Stage::Vertex => "vertex",
            Stage::Control => "control",
            Stage::Evaluation => "evaluation",
            Stage::Geometry => "geometry",
            Stage::Fragment => "fragment",
        }
    }

    /// First letter of the name, used to build interface field names.
    pub fn initial(self) -> char {
        match self {
            Stage::Host => 'h',
            Stage::Vertex => 'v',
            Stage::Control => 'c',
            Stage::Evaluation => 'e',
            Stage::Geometry => 'g',
            Stage::Fragment => 'f',
        }
    }

    /// Runtime enumerator value; the runtime numbers device stages from zero.
    pub fn runtime_value(self) -> Option<i64> {
        match self {
            Stage::Host => None,
            other => Some(other as i64 - 1),
        }
    }

    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name of an optional stage, `"none"` for the sentinel.
pub fn stage_name(stage: Option<Stage>) -> &'static str {
    stage.map_or("none", Stage::name)
}

/// Bit set of active stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StageMask(u32);

impl StageMask {
    pub fn empty() -> Self {
        Self(0)
    }

    /// The mask every pipeline function starts from: the host plus a vertex stage.
    pub fn host_and_vertex() -> Self {
        let mut mask = Self::empty();
        mask.insert(Stage::Host);
        mask.insert(Stage::Vertex);
        mask
    }

    pub fn insert(&mut self, stage: Stage) {
        self.0 |= 1 << stage.index();
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.0 & (1 << stage.index()) != 0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Active device stages in pipeline order.
    pub fn device_stages(&self) -> impl Iterator<Item = Stage> + '_ {
        Stage::DEVICE.into_iter().filter(|s| self.contains(*s))
    }

    /// Next active device stage after `stage`.
    pub fn next_active(&self, stage: Stage) -> Option<Stage> {
        Stage::DEVICE
            .into_iter()
            .find(|s| *s > stage && self.contains(*s))
    }

    /// Previous active device stage before `stage`.
    pub fn previous_active(&self, stage: Stage) -> Option<Stage> {
        Stage::DEVICE
            .into_iter()
            .rev()
            .find(|s| *s < stage && self.contains(*s))
    }
}

impl fmt::Display for StageMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = Stage::ALL
            .into_iter()
            .filter(|s| self.contains(*s))
            .map(Stage::name)
            .collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_orders_before_host() {
        assert!(None < Some(Stage::Host));
        assert_eq!(Some(Stage::Host).max(None), Some(Stage::Host));
        assert_eq!(Some(Stage::Vertex).max(Some(Stage::Fragment)), Some(Stage::Fragment));
    }

    #[test]
    fn test_mask_neighbours() {
        let mut mask = StageMask::host_and_vertex();
        mask.insert(Stage::Fragment);
        assert_eq!(mask.next_active(Stage::Vertex), Some(Stage::Fragment));
        assert_eq!(mask.previous_active(Stage::Fragment), Some(Stage::Vertex));
        assert_eq!(mask.previous_active(Stage::Vertex), None);
        assert_eq!(mask.next_active(Stage::Fragment), None);
        let device: Vec<_> = mask.device_stages().collect();
        assert_eq!(device, vec![Stage::Vertex, Stage::Fragment]);
        assert_eq!(mask.to_string(), "{host, vertex, fragment}");
    }

    #[test]
    fn test_runtime_values() {
        assert_eq!(Stage::Host.runtime_value(), None);
        assert_eq!(Stage::Vertex.runtime_value(), Some(0));
        assert_eq!(Stage::Fragment.runtime_value(), Some(4));
        assert_eq!(stage_name(None), "none");
    }
}
