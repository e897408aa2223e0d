use anyhow::{bail, Context, Result};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::bounds::Aabb;
use crate::camera3d::Camera3D;
use crate::config::euler_degrees_to_rotation;
use crate::renderable::{MaterialId, MeshHandle, MeshSurface, OtherSurface, Renderable, SkinnedSurface};

/// Handle of a scene object. Only meaningful for the scene that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// Handle of a renderable owned by a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

pub type CastingSurfaces = SmallVec<[SurfaceId; 4]>;

/// Read-only view of the host scene used by the shadow engine.
pub trait ShadowScene {
    /// True while the object exists (not destroyed).
    fn contains(&self, object: ObjectId) -> bool;

    /// True when the object exists and it and all of its ancestors are active.
    fn is_active_in_hierarchy(&self, object: ObjectId) -> bool;

    /// Renderables of the object and its active descendants, depth first.
    fn casting_surfaces(&self, object: ObjectId) -> CastingSurfaces;

    fn renderable(&self, surface: SurfaceId) -> Option<&Renderable>;

    /// Active objects carrying `tag`. Errors when the tag is unknown to the scene.
    fn find_objects_with_tag(&self, tag: &str) -> Result<Vec<ObjectId>>;

    fn object_name(&self, _object: ObjectId) -> Option<&str> {
        None
    }

    /// Orientation of the scene's main directional light, if there is one.
    fn main_light_rotation(&self) -> Option<Quat> {
        None
    }
}

#[derive(Debug, Clone)]
struct SceneObject {
    name: String,
    tag: Option<String>,
    active: bool,
    alive: bool,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    surfaces: Vec<SurfaceId>,
}

#[derive(Debug, Clone)]
struct SceneSurface {
    owner: ObjectId,
    renderable: Renderable,
}

/// In-memory object hierarchy implementing [`ShadowScene`].
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    objects: Vec<SceneObject>,
    surfaces: Vec<SceneSurface>,
    tags: BTreeSet<String>,
    main_light: Option<Quat>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, name: impl Into<String>) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(SceneObject {
            name: name.into(),
            tag: None,
            active: true,
            alive: true,
            parent: None,
            children: Vec::new(),
            surfaces: Vec::new(),
        });
        id
    }

    pub fn spawn_child(&mut self, parent: ObjectId, name: impl Into<String>) -> ObjectId {
        let id = self.spawn(name);
        if let Some(parent_object) = self.objects.get_mut(parent.0 as usize) {
            parent_object.children.push(id);
            self.objects[id.0 as usize].parent = Some(parent);
        }
        id
    }

    pub fn define_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
    }

    /// Tags the object, defining the tag if needed.
    pub fn set_tag(&mut self, object: ObjectId, tag: impl Into<String>) {
        let tag = tag.into();
        self.tags.insert(tag.clone());
        if let Some(entry) = self.objects.get_mut(object.0 as usize) {
            entry.tag = Some(tag);
        }
    }

    pub fn add_renderable(&mut self, object: ObjectId, renderable: Renderable) -> SurfaceId {
        let id = SurfaceId(self.surfaces.len() as u32);
        self.surfaces.push(SceneSurface { owner: object, renderable });
        if let Some(entry) = self.objects.get_mut(object.0 as usize) {
            entry.surfaces.push(id);
        }
        id
    }

    pub fn set_active(&mut self, object: ObjectId, active: bool) {
        if let Some(entry) = self.objects.get_mut(object.0 as usize) {
            entry.active = active;
        }
    }

    /// Destroys the object and its descendants.
    pub fn destroy(&mut self, object: ObjectId) {
        let mut stack = vec![object];
        while let Some(current) = stack.pop() {
            if let Some(entry) = self.objects.get_mut(current.0 as usize) {
                entry.alive = false;
                stack.extend(entry.children.iter().copied());
            }
        }
    }

    /// Moves every renderable of the object and its descendants by `delta`.
    pub fn translate(&mut self, object: ObjectId, delta: Vec3) {
        let mut stack = vec![object];
        while let Some(current) = stack.pop() {
            let Some(entry) = self.objects.get(current.0 as usize) else {
                continue;
            };
            stack.extend(entry.children.iter().copied());
            for surface in entry.surfaces.clone() {
                if let Some(surface) = self.surfaces.get_mut(surface.0 as usize) {
                    let bounds = surface.renderable.world_bounds_mut();
                    bounds.min += delta;
                    bounds.max += delta;
                }
            }
        }
    }

    pub fn set_main_light(&mut self, rotation: Option<Quat>) {
        self.main_light = rotation;
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn object(&self, object: ObjectId) -> Option<&SceneObject> {
        self.objects.get(object.0 as usize).filter(|entry| entry.alive)
    }

    fn has_parent_cycle(&self, object: ObjectId) -> bool {
        let mut current = self.objects.get(object.0 as usize).and_then(|entry| entry.parent);
        for _ in 0..self.objects.len() {
            match current {
                Some(id) if id == object => return true,
                Some(id) => current = self.objects.get(id.0 as usize).and_then(|entry| entry.parent),
                None => return false,
            }
        }
        // Chain longer than the object count loops somewhere above this object.
        current.is_some()
    }

    fn collect_surfaces(&self, object: ObjectId, out: &mut CastingSurfaces) {
        let Some(entry) = self.object(object) else {
            return;
        };
        out.extend(entry.surfaces.iter().copied());
        for child in &entry.children {
            if self.object(*child).map(|child| child.active).unwrap_or(false) {
                self.collect_surfaces(*child, out);
            }
        }
    }
}

impl ShadowScene for SceneGraph {
    fn contains(&self, object: ObjectId) -> bool {
        self.object(object).is_some()
    }

    fn is_active_in_hierarchy(&self, object: ObjectId) -> bool {
        let mut current = Some(object);
        while let Some(id) = current {
            match self.object(id) {
                Some(entry) if entry.active => current = entry.parent,
                _ => return false,
            }
        }
        true
    }

    fn casting_surfaces(&self, object: ObjectId) -> CastingSurfaces {
        let mut out = CastingSurfaces::new();
        self.collect_surfaces(object, &mut out);
        out
    }

    fn renderable(&self, surface: SurfaceId) -> Option<&Renderable> {
        let entry = self.surfaces.get(surface.0 as usize)?;
        self.object(entry.owner)?;
        Some(&entry.renderable)
    }

    fn find_objects_with_tag(&self, tag: &str) -> Result<Vec<ObjectId>> {
        if !self.tags.contains(tag) {
            bail!("Tag '{tag}' is not defined in this scene");
        }
        Ok((0..self.objects.len() as u32)
            .map(ObjectId)
            .filter(|id| {
                self.object(*id).map(|entry| entry.tag.as_deref() == Some(tag)).unwrap_or(false)
                    && self.is_active_in_hierarchy(*id)
            })
            .collect())
    }

    fn object_name(&self, object: ObjectId) -> Option<&str> {
        self.object(object).map(|entry| entry.name.as_str())
    }

    fn main_light_rotation(&self) -> Option<Quat> {
        self.main_light
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3Data> for Vec3 {
    fn from(value: Vec3Data) -> Self {
        Vec3::new(value.x, value.y, value.z)
    }
}

impl From<Vec3> for Vec3Data {
    fn from(value: Vec3) -> Self {
        Self { x: value.x, y: value.y, z: value.z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneRenderableKind {
    #[default]
    Mesh,
    Skinned,
    Other,
}

const fn default_submeshes() -> u32 {
    1
}

const fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRenderableData {
    #[serde(default)]
    pub kind: SceneRenderableKind,
    pub min: Vec3Data,
    pub max: Vec3Data,
    #[serde(default = "default_submeshes")]
    pub submeshes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<u32>,
}

impl SceneRenderableData {
    fn to_renderable(&self, index: usize) -> Renderable {
        let world_bounds = Aabb::new(self.min.into(), self.max.into());
        let material = self.material.map(MaterialId);
        let mesh = MeshHandle { id: self.mesh.unwrap_or(index as u32), submesh_count: self.submeshes };
        match self.kind {
            SceneRenderableKind::Mesh => {
                Renderable::Mesh(MeshSurface { mesh_filter: Some(mesh), material, world_bounds })
            }
            SceneRenderableKind::Skinned => {
                Renderable::Skinned(SkinnedSurface { shared_mesh: Some(mesh), material, world_bounds })
            }
            SceneRenderableKind::Other => Renderable::Other(OtherSurface { material, world_bounds }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObjectData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Index of the parent in the scene's object list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default)]
    pub renderables: Vec<SceneRenderableData>,
}

fn default_camera_position() -> Vec3Data {
    Vec3Data { x: 0.0, y: 2.0, z: 8.0 }
}

const fn default_camera_fov() -> f32 {
    60.0
}

const fn default_camera_near() -> f32 {
    0.1
}

const fn default_camera_far() -> f32 {
    200.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneCameraData {
    #[serde(default = "default_camera_position")]
    pub position: Vec3Data,
    #[serde(default)]
    pub target: Vec3Data,
    #[serde(default = "default_camera_fov")]
    pub fov_y_degrees: f32,
    #[serde(default = "default_camera_near")]
    pub near: f32,
    #[serde(default = "default_camera_far")]
    pub far: f32,
}

impl Default for SceneCameraData {
    fn default() -> Self {
        Self {
            position: default_camera_position(),
            target: Vec3Data::default(),
            fov_y_degrees: default_camera_fov(),
            near: default_camera_near(),
            far: default_camera_far(),
        }
    }
}

impl SceneCameraData {
    pub fn to_camera(&self) -> Camera3D {
        Camera3D::new(
            self.position.into(),
            self.target.into(),
            self.fov_y_degrees.to_radians(),
            self.near,
            self.far,
        )
    }
}

/// Serialized scene description loaded by the report tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub tags: Vec<String>,
    /// Main directional light orientation as Euler angles in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_light_euler: Option<Vec3Data>,
    #[serde(default)]
    pub camera: SceneCameraData,
    #[serde(default)]
    pub objects: Vec<SceneObjectData>,
}

impl SceneFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read scene file {}", path.display()))?;
        let scene = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse scene file {}", path.display()))?;
        Ok(scene)
    }

    /// Builds the graph; object `i` of the file becomes `ObjectId(i)`.
    pub fn to_graph(&self) -> Result<SceneGraph> {
        let mut graph = SceneGraph::new();
        for tag in &self.tags {
            graph.define_tag(tag.clone());
        }
        for object in &self.objects {
            graph.spawn(object.name.clone());
        }
        let mut surface_index = 0usize;
        for (index, object) in self.objects.iter().enumerate() {
            let id = ObjectId(index as u32);
            if let Some(parent) = object.parent {
                if parent >= self.objects.len() || parent == index {
                    bail!("Object '{}' has invalid parent index {parent}", object.name);
                }
                graph.objects[index].parent = Some(ObjectId(parent as u32));
                graph.objects[parent].children.push(id);
            }
            if let Some(tag) = &object.tag {
                graph.set_tag(id, tag.clone());
            }
            graph.set_active(id, object.active);
            for renderable in &object.renderables {
                graph.add_renderable(id, renderable.to_renderable(surface_index));
                surface_index += 1;
            }
        }
        if let Some(index) = (0..graph.objects.len()).find(|index| graph.has_parent_cycle(ObjectId(*index as u32))) {
            bail!("Object '{}' is part of a parent cycle", self.objects[index].name);
        }
        graph.set_main_light(self.main_light_euler.map(|euler| euler_degrees_to_rotation(euler.into())));
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(center: Vec3) -> Renderable {
        Renderable::Mesh(MeshSurface {
            mesh_filter: Some(MeshHandle { id: 0, submesh_count: 1 }),
            material: Some(MaterialId(1)),
            world_bounds: Aabb::from_center_size(center, Vec3::ONE),
        })
    }

    #[test]
    fn inactive_parent_hides_children() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn("root");
        let child = scene.spawn_child(root, "child");
        assert!(scene.is_active_in_hierarchy(child));
        scene.set_active(root, false);
        assert!(!scene.is_active_in_hierarchy(child));
        assert!(scene.contains(child));
    }

    #[test]
    fn destroy_cascades_to_children() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn("root");
        let child = scene.spawn_child(root, "child");
        let surface = scene.add_renderable(child, cube(Vec3::ZERO));
        scene.destroy(root);
        assert!(!scene.contains(child));
        assert!(scene.renderable(surface).is_none());
    }

    #[test]
    fn casting_surfaces_include_active_descendants_only() {
        let mut scene = SceneGraph::new();
        let root = scene.spawn("root");
        let a = scene.spawn_child(root, "a");
        let b = scene.spawn_child(root, "b");
        let root_surface = scene.add_renderable(root, cube(Vec3::ZERO));
        let a_surface = scene.add_renderable(a, cube(Vec3::X));
        scene.add_renderable(b, cube(Vec3::Y));
        scene.set_active(b, false);
        let surfaces = scene.casting_surfaces(root);
        assert_eq!(surfaces.as_slice(), &[root_surface, a_surface]);
    }

    #[test]
    fn unknown_tag_lookup_fails() {
        let scene = SceneGraph::new();
        let err = scene.find_objects_with_tag("Missing").unwrap_err();
        assert!(err.to_string().contains("not defined"));
    }

    #[test]
    fn scene_file_builds_hierarchy() {
        let json = r#"{
            "tags": ["Shadowed"],
            "objects": [
                { "name": "body", "tag": "Shadowed",
                  "renderables": [{ "min": {"x": -1, "y": 0, "z": -1}, "max": {"x": 1, "y": 2, "z": 1}, "material": 3 }] },
                { "name": "arm", "parent": 0,
                  "renderables": [{ "kind": "skinned", "min": {"x": 1, "y": 1, "z": 0}, "max": {"x": 2, "y": 1.5, "z": 0.5}, "submeshes": 2, "material": 3 }] }
            ]
        }"#;
        let file: SceneFile = serde_json::from_str(json).expect("scene parses");
        let scene = file.to_graph().expect("graph builds");
        let tagged = scene.find_objects_with_tag("Shadowed").expect("tag lookup");
        assert_eq!(tagged, vec![ObjectId(0)]);
        assert_eq!(scene.casting_surfaces(ObjectId(0)).len(), 2);
        assert_eq!(scene.object_name(ObjectId(1)), Some("arm"));
    }

    #[test]
    fn scene_file_rejects_parent_cycle() {
        let object = |name: &str, parent: usize| SceneObjectData {
            name: name.to_string(),
            tag: None,
            active: true,
            parent: Some(parent),
            renderables: Vec::new(),
        };
        let file = SceneFile { objects: vec![object("a", 1), object("b", 0)], ..SceneFile::default() };
        let err = file.to_graph().unwrap_err();
        assert!(err.to_string().contains("parent cycle"), "{err}");
    }

    #[test]
    fn scene_file_rejects_self_parent() {
        let file = SceneFile {
            objects: vec![SceneObjectData {
                name: "loop".to_string(),
                tag: None,
                active: true,
                parent: Some(0),
                renderables: Vec::new(),
            }],
            ..SceneFile::default()
        };
        assert!(file.to_graph().is_err());
    }
}
