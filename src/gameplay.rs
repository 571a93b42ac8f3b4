//! The gameplay mode: one loaded area and mission, simulated and drawn per frame.

use anyhow::{Context, Result};

use crate::data::ScenarioData;
use crate::draw::{Camera, DrawList};
use crate::factory::Registry;
use crate::gameobj::avatar;
use crate::gameobj::mesh::MeshLibrary;
use crate::gameobj::{object_registry, GameObjects, ObjectCtor};
use crate::input::Intent;
use crate::mission::{MissionFactories, MissionFsm, MissionOutcome, MissionView};
use crate::sim::Sim;

/// Name prefix of the player's avatar object.
const AVATAR_PREFIX: &str = "LIBAvatar";

pub struct Gameplay {
    data: ScenarioData,
    registry: Registry<ObjectCtor>,
    meshes: MeshLibrary,
    objects: GameObjects,
    fsm: Option<MissionFsm>,
    outcome: Option<MissionOutcome>,
}

impl Gameplay {
    pub fn new(data: ScenarioData) -> Result<Self> {
        let meshes = MeshLibrary::new(data.meshes.clone());
        let registry = object_registry()?;
        log::debug!(
            "Game object types: {}",
            registry.tags().collect::<Vec<_>>().join(", ")
        );
        Ok(Self {
            data,
            registry,
            meshes,
            objects: GameObjects::new(),
            fsm: None,
            outcome: None,
        })
    }

    pub fn objects(&self) -> &GameObjects {
        &self.objects
    }

    pub fn fsm(&self) -> Option<&MissionFsm> {
        self.fsm.as_ref()
    }

    pub fn outcome(&self) -> Option<MissionOutcome> {
        self.outcome
    }

    /// Replace the whole object table with the given area, then start the mission.
    /// Areas and missions are numbered from 1.
    pub fn load(&mut self, sim: &mut Sim, area: usize, mission: usize) -> Result<()> {
        let (area_decl, mission_decl) = self.data.mission(area, mission)?;

        self.fsm = None;
        self.outcome = None;
        self.objects.clear(sim.physics_mut());
        self.meshes.purge();

        self.objects
            .instantiate(area_decl, &self.registry, &mut sim.builder(&mut self.meshes))
            .with_context(|| format!("Unable to load area \"{}\"", area_decl.name))?;
        self.fsm = Some(MissionFsm::new(mission_decl.clone(), MissionFactories::new()?));

        log::info!(
            "Loaded area {area} \"{}\" with {} objects, mission {mission} \"{}\"",
            area_decl.name,
            self.objects.len(),
            mission_decl.name
        );
        Ok(())
    }

    pub fn view(&self, sim: &Sim) -> MissionView {
        let (rings_passed, rings_total) = self.objects.rings();
        MissionView {
            total_steps: sim.total_steps(),
            rings_passed,
            rings_total,
            avatar_pos: self
                .objects
                .find_by_prefix(AVATAR_PREFIX)
                .and_then(|e| self.objects.transform(e))
                .map(|t| t.pos),
        }
    }

    /// Run `steps` physics steps, each followed by one mission step.
    pub fn simulate(&mut self, sim: &mut Sim, steps: u32, intent: &Intent) -> Result<()> {
        for _ in 0..steps {
            sim.step(&mut self.objects, intent)?;
            let view = self.view(sim);
            if let Some(fsm) = &mut self.fsm {
                if let Some(outcome) = fsm.step(&view)? {
                    self.outcome = Some(outcome);
                }
            }
        }
        Ok(())
    }

    pub fn camera(&self) -> Result<Camera> {
        let t = self
            .objects
            .find_by_prefix(AVATAR_PREFIX)
            .and_then(|e| self.objects.transform(e))
            .context("No avatar in the current area")?;
        let (eye, target, up) = avatar::camera(&t);
        Ok(Camera { eye, target, up })
    }

    /// Fill `list` with this frame's scene and overlay.
    pub fn draw(&mut self, sim: &Sim, list: &mut DrawList) -> Result<()> {
        list.clear();
        list.camera = Some(self.camera()?);
        self.objects.draw(list);

        let view = self.view(sim);
        if let Some(fsm) = &mut self.fsm {
            fsm.draw(&view, &mut list.overlay)?;
            if let Some(outcome) = self.outcome {
                list.text(outcome.message());
                list.text(format!("Time: {:.2}s", fsm.elapsed_seconds(&view)));
            }
        }
        Ok(())
    }

    /// Release every object, then the physics world.
    pub fn deinit(&mut self, sim: &mut Sim) {
        self.fsm = None;
        sim.deinit(&mut self.objects);
        self.meshes.purge();
    }
}
