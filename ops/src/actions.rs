//! Pipeline actions.

use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
}

impl Comparator {
    pub fn parse(text: &str) -> Option<Comparator> {
        Some(match text {
            "lt" => Comparator::Lt,
            "lte" => Comparator::Lte,
            "gt" => Comparator::Gt,
            "gte" => Comparator::Gte,
            "eq" => Comparator::Eq,
            "neq" => Comparator::Neq,
            _ => return None,
        })
    }

    pub fn test(self, value: f32, reference: f32) -> bool {
        match self {
            Comparator::Lt => value < reference,
            Comparator::Lte => value <= reference,
            Comparator::Gt => value > reference,
            Comparator::Gte => value >= reference,
            Comparator::Eq => value == reference,
            Comparator::Neq => value != reference,
        }
    }
}

/// One step of the processing pipeline. Applied left to right; each action
/// produces a new table state.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Add a vector to every position.
    Translate(Vector3<f32>),
    /// Rotate by Euler angles in degrees, XYZ intrinsic.
    Rotate(Vector3<f32>),
    /// Uniform scale factor (> 0).
    Scale(f32),
    /// Drop rows containing non-finite values.
    FilterNan,
    /// Keep rows whose column satisfies the predicate.
    FilterByValue {
        column: String,
        comparator: Comparator,
        value: f32,
    },
    /// Drop spherical-harmonic columns above the given band (keeps rows).
    FilterBands(u32),
    /// Keep rows whose position lies inside the box.
    FilterBox {
        min: Vector3<f32>,
        max: Vector3<f32>,
    },
    /// Keep rows within `radius` of `center`.
    FilterSphere { center: Vector3<f32>, radius: f32 },
    /// Key/value stash for generator readers; no table effect.
    Param { key: String, value: String },
    /// Tag every row with a detail level (creates the `lod` column).
    Lod(u32),
}
