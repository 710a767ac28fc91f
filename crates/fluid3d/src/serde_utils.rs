//! Serde utilities for glam types.
//!
//! glam is built without its `serde` feature, so config structs route their
//! vectors through these proxies with `#[serde(with = "...")]`.

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Serde proxy for Vec3
#[derive(Serialize, Deserialize)]
pub struct Vec3Def {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Vec3Def {
    fn from(v: Vec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

impl From<Vec3Def> for Vec3 {
    fn from(def: Vec3Def) -> Self {
        Vec3::new(def.x, def.y, def.z)
    }
}

/// Serde proxy for UVec3
#[derive(Serialize, Deserialize)]
pub struct UVec3Def {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl From<UVec3> for UVec3Def {
    fn from(v: UVec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

impl From<UVec3Def> for UVec3 {
    fn from(def: UVec3Def) -> Self {
        UVec3::new(def.x, def.y, def.z)
    }
}

/// `#[serde(with = "serde_utils::vec3")]`
pub mod vec3 {
    use super::Vec3Def;
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(v: &Vec3, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Vec3Def::from(*v).serialize(s)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Vec3, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec3Def::deserialize(d).map(Vec3::from)
    }
}

/// `#[serde(with = "serde_utils::option_vec3")]`
pub mod option_vec3 {
    use super::Vec3Def;
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(v: &Option<Vec3>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        v.map(Vec3Def::from).serialize(s)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Option<Vec3>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Vec3Def>::deserialize(d).map(|v| v.map(Vec3::from))
    }
}

/// `#[serde(with = "serde_utils::uvec3")]`
pub mod uvec3 {
    use super::UVec3Def;
    use glam::UVec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(v: &UVec3, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        UVec3Def::from(*v).serialize(s)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<UVec3, D::Error>
    where
        D: Deserializer<'de>,
    {
        UVec3Def::deserialize(d).map(UVec3::from)
    }
}
