//! Scenario data: areas, their scene objects and missions, mesh shapes.
//!
//! Loaded from a JSON document. Areas and missions are addressed by
//! 1-based number, the way they are presented to the player.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::{EulerRot, Mat3, Vec3};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Implementation-specific parameters of a declared object, effect or condition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Params(pub Map<String, Value>);

impl Params {
    pub fn f32(&self, key: &str) -> Result<f32> {
        self.opt_f32(key)?
            .with_context(|| format!("Missing number parameter \"{key}\""))
    }

    pub fn f32_or(&self, key: &str, default: f32) -> Result<f32> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_f64()
                .map(|f| f as f32)
                .with_context(|| format!("Parameter \"{key}\" must be a number")),
        }
    }

    pub fn opt_f32(&self, key: &str) -> Result<Option<f32>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(_) => self.f32_or(key, 0.0).map(Some),
        }
    }

    pub fn u32(&self, key: &str) -> Result<u32> {
        if !self.0.contains_key(key) {
            bail!("Missing integer parameter \"{key}\"");
        }
        self.u32_or(key, 0)
    }

    pub fn u32_or(&self, key: &str, default: u32) -> Result<u32> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .with_context(|| format!("Parameter \"{key}\" must be a non-negative integer")),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .with_context(|| format!("Parameter \"{key}\" must be true or false")),
        }
    }

    pub fn str(&self, key: &str) -> Result<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .with_context(|| format!("Missing string parameter \"{key}\""))
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str> {
        match self.0.get(key) {
            None => Ok(default),
            Some(_) => self.str(key),
        }
    }
}

/// A tagged record: `{"type": "...", ...params}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TypedDecl {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: Params,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectDecl {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub pos: [f32; 3],
    /// Euler angles in degrees, applied Y then X then Z.
    #[serde(default)]
    pub rot: [f32; 3],
    #[serde(flatten)]
    pub params: Params,
}

impl ObjectDecl {
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.pos)
    }

    pub fn rotation(&self) -> Mat3 {
        let [x, y, z] = self.rot;
        Mat3::from_euler(EulerRot::YXZ, y.to_radians(), x.to_radians(), z.to_radians())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionDecl {
    pub target: String,
    #[serde(default)]
    pub conditions: Vec<TypedDecl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateDecl {
    pub name: String,
    #[serde(default)]
    pub effects: Vec<TypedDecl>,
    #[serde(default)]
    pub transitions: Vec<TransitionDecl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MissionDecl {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub states: Vec<StateDecl>,
}

impl MissionDecl {
    pub fn state(&self, name: &str) -> Option<&StateDecl> {
        self.states.iter().find(|s| s.name == name)
    }
}

fn default_bubble_radius() -> f32 {
    5000.0
}

fn default_sky_color() -> [f32; 3] {
    [0.4, 0.6, 0.9]
}

/// Ambient sky parameters of an area.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SkyDecl {
    #[serde(default = "default_bubble_radius")]
    pub bubble_radius: f32,
    #[serde(default = "default_sky_color")]
    pub color: [f32; 3],
}

impl Default for SkyDecl {
    fn default() -> Self {
        Self {
            bubble_radius: default_bubble_radius(),
            color: default_sky_color(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AreaDecl {
    pub name: String,
    #[serde(default)]
    pub sky: SkyDecl,
    #[serde(default)]
    pub objects: Vec<ObjectDecl>,
    #[serde(default)]
    pub missions: Vec<MissionDecl>,
}

/// Collision shape of a named mesh.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum MeshDecl {
    Sphere { radius: f32 },
    Box { half: [f32; 3] },
    Capsule { radius: f32, length: f32 },
    /// Infinite ground plane through the object's origin, facing its local +Y.
    Ground,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioData {
    #[serde(default)]
    pub meshes: BTreeMap<String, MeshDecl>,
    pub areas: Vec<AreaDecl>,
}

impl ScenarioData {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read mission data from {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Malformed mission data in {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let data: ScenarioData = serde_json::from_str(text)?;
        data.validate()?;
        Ok(data)
    }

    /// Structural checks serde cannot express.
    fn validate(&self) -> Result<()> {
        for area in &self.areas {
            let mut names = std::collections::HashSet::new();
            for obj in &area.objects {
                if !names.insert(obj.name.as_str()) {
                    bail!("Area \"{}\" declares object \"{}\" twice", area.name, obj.name);
                }
            }
            for mission in &area.missions {
                if mission.state("start").is_none() {
                    bail!("Mission \"{}\" has no \"start\" state", mission.name);
                }
                for state in &mission.states {
                    if state.name == "win" || state.name == "fail" {
                        bail!(
                            "Mission \"{}\" declares reserved state \"{}\"",
                            mission.name,
                            state.name
                        );
                    }
                }
            }
        }
        Ok(())
    }

    pub fn area(&self, number: usize) -> Result<&AreaDecl> {
        number
            .checked_sub(1)
            .and_then(|i| self.areas.get(i))
            .with_context(|| format!("Area {number} not found"))
    }

    pub fn mission(&self, area: usize, mission: usize) -> Result<(&AreaDecl, &MissionDecl)> {
        let area_decl = self.area(area)?;
        let mission_decl = mission
            .checked_sub(1)
            .and_then(|i| area_decl.missions.get(i))
            .with_context(|| format!("Mission {mission} not found in area {area}"))?;
        Ok((area_decl, mission_decl))
    }

    pub fn mesh(&self, name: &str) -> Result<&MeshDecl> {
        self.meshes
            .get(name)
            .with_context(|| format!("Mesh \"{name}\" not found"))
    }
}
