use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use glam::Vec3;

use super::binding::PhysicsBinding;
use super::{GameObjects, ObjectBuilder, Transform};
use crate::cache::ResourceCache;
use crate::collision::{AlwaysAccept, AvatarSticky, CollisionHandler, TrackedCollisionLog};
use crate::data::{MeshDecl, ObjectDecl};
use crate::geometry::Plane;
use crate::physics::{MassProps, Shape, SpaceKind};

/// Named mesh shapes, loaded on demand and shared while in use.
pub struct MeshLibrary {
    decls: BTreeMap<String, MeshDecl>,
    cache: ResourceCache<MeshDecl>,
}

impl MeshLibrary {
    pub fn new(decls: BTreeMap<String, MeshDecl>) -> Self {
        Self {
            decls,
            cache: ResourceCache::new(),
        }
    }

    pub fn load(&mut self, name: &str) -> Result<Arc<MeshDecl>> {
        let decls = &self.decls;
        self.cache.get(name, || {
            decls
                .get(name)
                .cloned()
                .with_context(|| format!("Mesh \"{name}\" not found"))
        })
    }

    /// Forget meshes no longer used by any object.
    pub fn purge(&mut self) {
        self.cache.purge();
    }

    pub fn live_count(&self) -> usize {
        self.cache.live_count()
    }
}

/// A static or free-floating piece of scenery.
pub struct MeshObject {
    pub mesh_name: String,
    pub mesh: Arc<MeshDecl>,
}

/// Collision shape of a mesh in its own frame. Ground is the local XZ plane.
fn shape_for(mesh: &MeshDecl) -> Shape {
    match *mesh {
        MeshDecl::Sphere { radius } => Shape::Sphere { radius },
        MeshDecl::Box { half } => Shape::Box {
            half: Vec3::from(half),
        },
        MeshDecl::Capsule { radius, length } => Shape::Capsule { radius, length },
        MeshDecl::Ground => Shape::Plane(Plane::new(0.0, 1.0, 0.0, 0.0)),
    }
}

fn mass_for(mesh: &MeshDecl, mass: f32) -> Result<MassProps> {
    Ok(match *mesh {
        MeshDecl::Sphere { radius } => MassProps::sphere(mass, radius),
        MeshDecl::Box { half } => MassProps::cuboid(mass, Vec3::from(half)),
        MeshDecl::Capsule { radius, length } => MassProps::capsule(mass, radius, length),
        MeshDecl::Ground => bail!("Ground meshes cannot have mass"),
    })
}

/// Params: `mesh` (required), `mass` (makes it dynamic), `runnable`, `tracked`.
pub fn build(objects: &mut GameObjects, b: &mut ObjectBuilder, decl: &ObjectDecl) -> Result<hecs::Entity> {
    let mesh_name = decl.params.str("mesh")?.to_owned();
    let mass = decl.params.opt_f32("mass")?;
    let runnable = decl.params.bool_or("runnable", false)?;
    let tracked = decl.params.bool_or("tracked", false)?;
    if runnable && tracked {
        bail!("A mesh object cannot be both runnable and tracked");
    }
    let mesh = b.meshes.load(&mesh_name)?;

    let pos = decl.position();
    let rot = decl.rotation();
    let e = objects.spawn(&decl.name, Transform::new(pos, rot))?;

    let mut binding = PhysicsBinding::new(e);
    let space = match mass {
        Some(m) => {
            binding.set_body(b.physics, mass_for(&mesh, m)?, pos, rot)?;
            SpaceKind::Dynamic
        }
        None => SpaceKind::Static,
    };
    let handler: Box<dyn CollisionHandler> = if runnable {
        Box::new(AvatarSticky)
    } else if tracked {
        Box::new(TrackedCollisionLog::new())
    } else {
        Box::new(AlwaysAccept)
    };
    binding.set_geom(
        b.physics,
        "mesh",
        shape_for(&mesh),
        space,
        handler,
        None,
        pos,
        rot,
    )?;
    objects.insert(e, (binding, MeshObject { mesh_name, mesh }))?;
    Ok(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ScenarioData;
    use crate::gameobj::object_registry;
    use crate::physics::{GeomHandle, PhysicsWorld};

    #[test]
    fn library_shares_loaded_meshes() {
        let mut decls = BTreeMap::new();
        decls.insert("rock".to_owned(), MeshDecl::Sphere { radius: 2.0 });
        let mut lib = MeshLibrary::new(decls);

        let a = lib.load("rock").unwrap();
        let b = lib.load("rock").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(lib.live_count(), 1);
        drop((a, b));
        assert_eq!(lib.live_count(), 0);

        let err = lib.load("cliff").unwrap_err();
        assert_eq!(err.to_string(), "Mesh \"cliff\" not found");
    }

    fn ground_area(rot: [f32; 3]) -> (GameObjects, PhysicsWorld, MeshLibrary) {
        let json = format!(
            r#"{{
                "meshes": {{ "ground": {{ "shape": "ground" }}, "rock": {{ "shape": "sphere", "radius": 1.0 }} }},
                "areas": [{{
                    "name": "Field",
                    "objects": [
                        {{ "type": "Mesh", "name": "Floor", "pos": [0, 0, 3], "rot": {rot:?}, "mesh": "ground" }},
                        {{ "type": "Mesh", "name": "Rock1", "pos": [0, 0.5, 0], "mesh": "rock", "mass": 1.0 }},
                        {{ "type": "Mesh", "name": "Rock2", "pos": [50, 0, 0], "mesh": "rock", "mass": 1.0 }}
                    ]
                }}]
            }}"#
        );
        let data = ScenarioData::parse(&json).unwrap();
        let mut physics = PhysicsWorld::default();
        let mut meshes = MeshLibrary::new(data.meshes.clone());
        let mut objects = GameObjects::new();
        let registry = object_registry().unwrap();
        objects
            .instantiate(
                data.area(1).unwrap(),
                &registry,
                &mut ObjectBuilder {
                    physics: &mut physics,
                    meshes: &mut meshes,
                },
            )
            .unwrap();
        (objects, physics, meshes)
    }

    fn geom_of(objects: &GameObjects, name: &str) -> GeomHandle {
        let e = objects.get(name).unwrap();
        let binding = objects.world().get::<&PhysicsBinding>(e).unwrap();
        binding.geom("mesh").unwrap()
    }

    #[test]
    fn mesh_objects_share_one_cached_mesh() {
        let (objects, _physics, meshes) = ground_area([0.0, 0.0, 0.0]);
        let mesh_of = |name: &str| {
            let e = objects.get(name).unwrap();
            let m = objects.world().get::<&MeshObject>(e).unwrap();
            m.mesh.clone()
        };
        assert!(Arc::ptr_eq(&mesh_of("Rock1"), &mesh_of("Rock2")));
        assert_eq!(meshes.live_count(), 2);
        assert!(mass_for(&MeshDecl::Ground, 1.0).is_err());
    }

    #[test]
    fn ground_follows_the_object_placement() {
        // Pitched 90 degrees the floor faces +Z through z = 3
        let (objects, physics, _meshes) = ground_area([90.0, 0.0, 0.0]);
        let floor = physics.geom_placed(geom_of(&objects, "Floor")).unwrap();
        let Shape::Plane(local) = floor.shape else {
            panic!("ground should be a plane, got {:?}", floor.shape);
        };
        let world = floor.world_plane(local);
        assert!((world.normal() - Vec3::Z).length() < 1e-5, "{:?}", world.normal());
        assert!(world.signed_distance(Vec3::new(5.0, 5.0, 3.0)).abs() < 1e-5);
    }

    #[test]
    fn moving_the_ground_moves_its_collision() {
        let (mut objects, mut physics, _meshes) = ground_area([0.0, 0.0, 0.0]);
        let floor = geom_of(&objects, "Floor");
        let rock = geom_of(&objects, "Rock1");
        assert!(!physics.collide(rock, floor).is_empty());

        let e = objects.get("Floor").unwrap();
        objects.set_pos(&mut physics, e, Vec3::new(0.0, -100.0, 0.0)).unwrap();
        assert!(physics.collide(rock, floor).is_empty());

        // Raised above the rock, the floor now pushes it further up
        objects.set_pos(&mut physics, e, Vec3::new(0.0, 0.8, 0.0)).unwrap();
        let contacts = physics.collide(rock, floor);
        assert!(!contacts.is_empty());
        for c in &contacts {
            assert!((c.normal - Vec3::Y).length() < 1e-5);
            assert!((c.depth - 1.3).abs() < 1e-4, "depth {}", c.depth);
        }
    }
}
