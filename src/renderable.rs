use crate::bounds::Aabb;
use crate::renderer::CommandSink;
use crate::scene::SurfaceId;

/// Host material handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// Host mesh handle along with the number of submeshes it exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle {
    pub id: u32,
    pub submesh_count: u32,
}

/// Static mesh drawn through a mesh filter.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSurface {
    pub mesh_filter: Option<MeshHandle>,
    pub material: Option<MaterialId>,
    pub world_bounds: Aabb,
}

/// Skinned mesh; the submesh count lives on the shared mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedSurface {
    pub shared_mesh: Option<MeshHandle>,
    pub material: Option<MaterialId>,
    pub world_bounds: Aabb,
}

/// Any other renderer kind. Contributes to bounds but is never drawn into the atlas.
#[derive(Debug, Clone, PartialEq)]
pub struct OtherSurface {
    pub material: Option<MaterialId>,
    pub world_bounds: Aabb,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Renderable {
    Mesh(MeshSurface),
    Skinned(SkinnedSurface),
    Other(OtherSurface),
}

/// What the generating pass needs from a renderable to draw it into a slice.
pub trait ShadowCaster {
    fn submesh_count(&self) -> u32;

    fn shared_material(&self) -> Option<MaterialId>;

    fn world_bounds(&self) -> Aabb;

    /// Queues one submesh. Surfaces without a material draw nothing.
    fn submit_draw(&self, sink: &mut dyn CommandSink, surface: SurfaceId, submesh: u32, pass: u32) {
        if let Some(material) = self.shared_material() {
            sink.draw_renderer(surface, material, submesh, pass);
        }
    }
}

impl ShadowCaster for MeshSurface {
    fn submesh_count(&self) -> u32 {
        self.mesh_filter.map(|mesh| mesh.submesh_count).unwrap_or(0)
    }

    fn shared_material(&self) -> Option<MaterialId> {
        self.material
    }

    fn world_bounds(&self) -> Aabb {
        self.world_bounds
    }
}

impl ShadowCaster for SkinnedSurface {
    fn submesh_count(&self) -> u32 {
        self.shared_mesh.map(|mesh| mesh.submesh_count).unwrap_or(0)
    }

    fn shared_material(&self) -> Option<MaterialId> {
        self.material
    }

    fn world_bounds(&self) -> Aabb {
        self.world_bounds
    }
}

impl ShadowCaster for OtherSurface {
    fn submesh_count(&self) -> u32 {
        0
    }

    fn shared_material(&self) -> Option<MaterialId> {
        self.material
    }

    fn world_bounds(&self) -> Aabb {
        self.world_bounds
    }
}

impl Renderable {
    fn caster(&self) -> &dyn ShadowCaster {
        match self {
            Renderable::Mesh(surface) => surface,
            Renderable::Skinned(surface) => surface,
            Renderable::Other(surface) => surface,
        }
    }

    pub fn world_bounds_mut(&mut self) -> &mut Aabb {
        match self {
            Renderable::Mesh(surface) => &mut surface.world_bounds,
            Renderable::Skinned(surface) => &mut surface.world_bounds,
            Renderable::Other(surface) => &mut surface.world_bounds,
        }
    }
}

impl ShadowCaster for Renderable {
    fn submesh_count(&self) -> u32 {
        self.caster().submesh_count()
    }

    fn shared_material(&self) -> Option<MaterialId> {
        self.caster().shared_material()
    }

    fn world_bounds(&self) -> Aabb {
        self.caster().world_bounds()
    }

    fn submit_draw(&self, sink: &mut dyn CommandSink, surface: SurfaceId, submesh: u32, pass: u32) {
        self.caster().submit_draw(sink, surface, submesh, pass);
    }
}
