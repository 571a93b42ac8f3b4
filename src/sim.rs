//! One fixed physics step: collision dispatch, integration, object hooks.

use anyhow::Result;

use crate::collision::{dispatch_pair, CollisionCtx};
use crate::constants::STEP_SECONDS;
use crate::gameobj::mesh::MeshLibrary;
use crate::gameobj::{GameObjects, ObjectBuilder, StepCtx};
use crate::input::Intent;
use crate::physics::PhysicsWorld;

/// The physics world plus the global step counter. Lives for the whole
/// session; only the game-object table is rebuilt between missions.
pub struct Sim {
    physics: PhysicsWorld,
    total_steps: u64,
}

impl Sim {
    pub fn init() -> Self {
        log::info!("Physics world initialized");
        Self {
            physics: PhysicsWorld::default(),
            total_steps: 0,
        }
    }

    /// Release every object's physics, then the world itself.
    pub fn deinit(&mut self, objects: &mut GameObjects) {
        objects.clear(&mut self.physics);
        self.physics.clear();
        log::info!("Physics world released after {} steps", self.total_steps);
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn builder<'a>(&'a mut self, meshes: &'a mut MeshLibrary) -> ObjectBuilder<'a> {
        ObjectBuilder {
            physics: &mut self.physics,
            meshes,
        }
    }

    /// Advance by exactly one `STEP_SECONDS` tick.
    pub fn step(&mut self, objects: &mut GameObjects, intent: &Intent) -> Result<()> {
        let step = self.total_steps;
        self.physics.clear_contact_group();

        let pairs = self.physics.near_pairs();
        let mut ctx = CollisionCtx {
            objects: objects.world_mut(),
            step,
        };
        for (g1, g2) in pairs {
            dispatch_pair(&mut self.physics, &mut ctx, g1, g2)?;
        }

        self.physics.quick_step(STEP_SECONDS);

        let mut ctx = StepCtx {
            physics: &mut self.physics,
            step,
            intent,
        };
        objects.post_step(&mut ctx)?;

        self.total_steps += 1;
        Ok(())
    }
}
