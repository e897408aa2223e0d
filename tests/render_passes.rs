use glam::{UVec2, Vec3};
use object_shadow_atlas::bounds::Aabb;
use object_shadow_atlas::camera3d::{Camera3D, ViewerCamera};
use object_shadow_atlas::config::{ResolveConfig, ScreenShadowFormat, ShadowSettings, SliceResolution, UpdateMethod};
use object_shadow_atlas::engine::ShadowEngine;
use object_shadow_atlas::renderable::{
    MaterialId, MeshHandle, MeshSurface, OtherSurface, Renderable, SkinnedSurface,
};
use object_shadow_atlas::renderer::{
    CommandRecorder, RecordedCommand, ResolvePass, ShadowPass, ShadowPassParams, ViewportRect, VirtualTargetPool,
    DEPTH_FORMAT, PER_OBJECT_SHADOW_ATLAS, SCREEN_SPACE_SHADOW_MAP, SLICE_UV_OFFSET_EXTEND, WORLD_TO_UV_MATRIX,
};
use object_shadow_atlas::scene::{ObjectId, SceneGraph};

const TAG: &str = "PerObjectShadow";
const RESOLVE_MATERIAL: MaterialId = MaterialId(99);

fn viewer() -> ViewerCamera {
    Camera3D::new(Vec3::new(0.0, 2.0, 8.0), Vec3::ZERO, 60.0_f32.to_radians(), 0.1, 200.0).viewer(1280, 720)
}

fn settings() -> ShadowSettings {
    ShadowSettings {
        max_objects: 2,
        slice_max_resolution: SliceResolution::R256,
        slice_min_resolution: SliceResolution::R256,
        frustum_culling: false,
        euler_angles: Vec3::ZERO.into(),
        ..ShadowSettings::default()
    }
}

fn mesh(center: Vec3, submeshes: u32, material: Option<MaterialId>) -> Renderable {
    Renderable::Mesh(MeshSurface {
        mesh_filter: Some(MeshHandle { id: 0, submesh_count: submeshes }),
        material,
        world_bounds: Aabb::from_center_size(center, Vec3::ONE),
    })
}

/// Two tagged objects: a character with a two-submesh body, a skinned cape and an unlit marker,
/// and a prop whose only surface has no material.
fn tagged_scene() -> (SceneGraph, ObjectId, ObjectId) {
    let mut scene = SceneGraph::new();
    scene.define_tag(TAG);
    let hero = scene.spawn("hero");
    scene.set_tag(hero, TAG);
    scene.add_renderable(hero, mesh(Vec3::new(-2.0, 0.5, 0.0), 2, Some(MaterialId(1))));
    scene.add_renderable(
        hero,
        Renderable::Skinned(SkinnedSurface {
            shared_mesh: Some(MeshHandle { id: 1, submesh_count: 1 }),
            material: Some(MaterialId(2)),
            world_bounds: Aabb::from_center_size(Vec3::new(-2.0, 0.6, 0.2), Vec3::splat(0.5)),
        }),
    );
    scene.add_renderable(
        hero,
        Renderable::Other(OtherSurface {
            material: Some(MaterialId(3)),
            world_bounds: Aabb::from_center_size(Vec3::new(-2.0, 0.5, 0.0), Vec3::splat(0.1)),
        }),
    );
    let prop = scene.spawn("prop");
    scene.set_tag(prop, TAG);
    scene.add_renderable(prop, mesh(Vec3::new(2.0, 0.5, 0.0), 1, None));
    (scene, hero, prop)
}

fn run_shadow_frame(
    pass: &mut ShadowPass,
    engine: &mut ShadowEngine,
    scene: &SceneGraph,
    recorder: &mut CommandRecorder,
) -> usize {
    let mut targets = VirtualTargetPool::new();
    pass.configure(engine, scene, &mut targets, recorder);
    pass.execute(ShadowPassParams { engine, scene, camera: &viewer(), sink: recorder }).expect("shadow pass")
}

#[test]
fn shadow_pass_draws_every_submesh_into_its_slice() {
    let (scene, _, _) = tagged_scene();
    let mut engine = ShadowEngine::new(settings());
    let mut pass = ShadowPass::new(&mut engine, &scene);
    let mut recorder = CommandRecorder::new();

    let drawn = run_shadow_frame(&mut pass, &mut engine, &scene, &mut recorder);
    assert_eq!(drawn, 2);

    // Two body submeshes and one skinned submesh; the marker and the material-less prop are skipped.
    assert_eq!(recorder.renderer_draw_count(), 3);
    let passes: Vec<u32> = recorder
        .commands()
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::DrawRenderer { pass, .. } => Some(*pass),
            _ => None,
        })
        .collect();
    assert!(passes.iter().all(|pass| *pass == engine.settings().depth_pass));

    assert_eq!(
        recorder.viewports(),
        vec![
            ViewportRect { x: 0.0, y: 0.0, width: 256.0, height: 256.0 },
            ViewportRect { x: 256.0, y: 0.0, width: 256.0, height: 256.0 },
        ]
    );
    assert!(recorder.commands().iter().any(|command| matches!(
        command,
        RecordedCommand::SetGlobalTexture { symbol, .. } if *symbol == PER_OBJECT_SHADOW_ATLAS
    )));
}

#[test]
fn shadow_pass_restores_viewer_matrices() {
    let (scene, _, _) = tagged_scene();
    let mut engine = ShadowEngine::new(settings());
    let mut pass = ShadowPass::new(&mut engine, &scene);
    let mut recorder = CommandRecorder::new();
    run_shadow_frame(&mut pass, &mut engine, &scene, &mut recorder);

    let camera = viewer();
    let last = recorder.commands().iter().rev().find_map(|command| match command {
        RecordedCommand::SetViewProjection { view, projection } => Some((*view, *projection)),
        _ => None,
    });
    assert_eq!(last, Some((camera.view, camera.projection)));
}

#[test]
fn shadow_pass_binds_a_cleared_depth_atlas() {
    let (scene, _, _) = tagged_scene();
    let mut engine = ShadowEngine::new(settings());
    let mut pass = ShadowPass::new(&mut engine, &scene);
    let mut targets = VirtualTargetPool::new();
    let mut recorder = CommandRecorder::new();
    pass.configure(&mut engine, &scene, &mut targets, &mut recorder);

    let atlas = pass.atlas_target().expect("atlas allocated");
    let desc = targets.target(atlas).expect("atlas desc");
    assert_eq!(desc.format, DEPTH_FORMAT);
    assert_eq!(desc.size(), UVec2::new(512, 256));
    assert!(desc.depth_bits >= 16);
    assert!(matches!(recorder.commands().first(), Some(RecordedCommand::SetRenderTarget { target, .. }) if *target == atlas));
}

#[test]
fn failed_atlas_allocation_skips_the_frame() {
    let (scene, _, _) = tagged_scene();
    let mut engine = ShadowEngine::new(settings());
    let mut pass = ShadowPass::new(&mut engine, &scene);
    let mut targets = VirtualTargetPool::with_max_dimension(128);
    let mut recorder = CommandRecorder::new();
    pass.configure(&mut engine, &scene, &mut targets, &mut recorder);
    assert!(pass.atlas_target().is_none());

    let drawn = pass
        .execute(ShadowPassParams { engine: &mut engine, scene: &scene, camera: &viewer(), sink: &mut recorder })
        .expect("skipped frame is not an error");
    assert_eq!(drawn, 0);
    assert!(recorder.commands().is_empty());
}

#[test]
fn failed_allocation_drops_previous_frame_slices() {
    let (scene, _, _) = tagged_scene();
    let mut engine = ShadowEngine::new(settings());
    let mut pass = ShadowPass::new(&mut engine, &scene);
    let mut recorder = CommandRecorder::new();
    assert_eq!(run_shadow_frame(&mut pass, &mut engine, &scene, &mut recorder), 2);

    let mut small = VirtualTargetPool::with_max_dimension(64);
    recorder.clear();
    pass.configure(&mut engine, &scene, &mut small, &mut recorder);
    let drawn = pass
        .execute(ShadowPassParams { engine: &mut engine, scene: &scene, camera: &viewer(), sink: &mut recorder })
        .expect("skipped frame is not an error");
    assert_eq!(drawn, 0);
    assert_eq!(engine.active_slice_count(), 0);
    assert_eq!(engine.registered_count(), 2);

    let mut resolve = ResolvePass::new(ResolveConfig::default(), Some(RESOLVE_MATERIAL));
    assert_eq!(resolve.execute(&engine, &mut recorder), 0);
    assert_eq!(recorder.instanced_draw_count(), 0);
}

#[test]
fn zero_capacity_makes_both_passes_no_ops() {
    let (scene, _, _) = tagged_scene();
    let mut engine = ShadowEngine::new(ShadowSettings { max_objects: 0, ..settings() });
    let mut pass = ShadowPass::new(&mut engine, &scene);
    let mut targets = VirtualTargetPool::new();
    let mut recorder = CommandRecorder::new();

    pass.configure(&mut engine, &scene, &mut targets, &mut recorder);
    assert!(targets.is_empty());
    assert!(pass.atlas_target().is_none());
    let drawn = pass
        .execute(ShadowPassParams { engine: &mut engine, scene: &scene, camera: &viewer(), sink: &mut recorder })
        .expect("empty pool is not an error");
    assert_eq!(drawn, 0);

    let mut resolve = ResolvePass::new(ResolveConfig::default(), Some(RESOLVE_MATERIAL));
    resolve.configure(&mut targets, &mut recorder, UVec2::new(1280, 720));
    assert_eq!(resolve.execute(&engine, &mut recorder), 0);
    assert!(recorder.commands().is_empty());
}

#[test]
fn invalid_settings_abort_before_drawing() {
    let (scene, _, _) = tagged_scene();
    let mut engine = ShadowEngine::new(ShadowSettings { slice_min_resolution: SliceResolution::R512, ..settings() });
    let mut pass = ShadowPass::new(&mut engine, &scene);
    let mut targets = VirtualTargetPool::new();
    let mut recorder = CommandRecorder::new();
    pass.configure(&mut engine, &scene, &mut targets, &mut recorder);
    recorder.clear();

    let result =
        pass.execute(ShadowPassParams { engine: &mut engine, scene: &scene, camera: &viewer(), sink: &mut recorder });
    assert!(result.is_err());
    assert_eq!(recorder.renderer_draw_count(), 0);

    let mut resolve = ResolvePass::new(ResolveConfig::default(), Some(RESOLVE_MATERIAL));
    assert_eq!(resolve.execute(&engine, &mut recorder), 0);
    assert_eq!(recorder.instanced_draw_count(), 0);
}

#[test]
fn update_methods_control_discovery() {
    let (scene, hero, _) = tagged_scene();

    let mut manual = ShadowEngine::new(ShadowSettings { update_method: UpdateMethod::Manual, ..settings() });
    let mut pass = ShadowPass::new(&mut manual, &scene);
    let mut recorder = CommandRecorder::new();
    assert_eq!(run_shadow_frame(&mut pass, &mut manual, &scene, &mut recorder), 0);
    assert_eq!(manual.registered_count(), 0);

    let mut on_init = ShadowEngine::new(ShadowSettings { update_method: UpdateMethod::OnInit, ..settings() });
    let _pass = ShadowPass::new(&mut on_init, &scene);
    assert_eq!(on_init.registered_count(), 2);
    assert_eq!(on_init.slot_of(hero), Some(0));
}

#[test]
fn resolve_pass_draws_one_instance_per_active_slice() {
    let (scene, _, _) = tagged_scene();
    let mut engine = ShadowEngine::new(settings());
    let mut shadow = ShadowPass::new(&mut engine, &scene);
    let mut recorder = CommandRecorder::new();
    run_shadow_frame(&mut shadow, &mut engine, &scene, &mut recorder);
    recorder.clear();

    let mut resolve = ResolvePass::new(ResolveConfig::default(), Some(RESOLVE_MATERIAL));
    let mut targets = VirtualTargetPool::new();
    resolve.configure(&mut targets, &mut recorder, UVec2::new(1280, 720));
    assert!(resolve.screen_target().is_none());
    assert_eq!(resolve.execute(&engine, &mut recorder), 2);

    let draw = recorder.commands().iter().find_map(|command| match command {
        RecordedCommand::DrawMeshInstanced { material, index_count, models, properties } => {
            Some((*material, *index_count, models.clone(), properties.clone()))
        }
        _ => None,
    });
    let (material, index_count, models, properties) = draw.expect("instanced draw recorded");
    assert_eq!(material, RESOLVE_MATERIAL);
    assert_eq!(index_count, 36);
    assert_eq!(models.as_slice(), engine.frustum_local_to_world_matrices());
    assert_eq!(properties.matrix_array(WORLD_TO_UV_MATRIX), Some(engine.world_to_atlas_uv_matrices()));
    assert_eq!(properties.vector_array(SLICE_UV_OFFSET_EXTEND), Some(engine.slice_uv_rects()));

    let instances = ResolvePass::pack_instances(&engine);
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[1].uv_offset_extent, [0.5, 0.0, 0.5, 1.0]);
    assert_eq!(bytemuck::cast_slice::<_, u8>(&instances).len(), 2 * (16 + 16 + 4) * 4);
}

#[test]
fn resolve_to_texture_publishes_screen_shadow_map() {
    let (scene, _, _) = tagged_scene();
    let mut engine = ShadowEngine::new(settings());
    let mut shadow = ShadowPass::new(&mut engine, &scene);
    let mut recorder = CommandRecorder::new();
    run_shadow_frame(&mut shadow, &mut engine, &scene, &mut recorder);
    recorder.clear();

    let config = ResolveConfig { resolve_to_texture: true, texture_format: ScreenShadowFormat::Rgba8 };
    let mut resolve = ResolvePass::new(config, Some(RESOLVE_MATERIAL));
    let mut targets = VirtualTargetPool::new();
    resolve.configure(&mut targets, &mut recorder, UVec2::new(1280, 720));
    let target = resolve.screen_target().expect("screen target");
    let desc = targets.target(target).expect("desc");
    assert_eq!(desc.format, wgpu::TextureFormat::Rgba8Unorm);
    assert_eq!(desc.size(), UVec2::new(1280, 720));

    resolve.execute(&engine, &mut recorder);
    assert!(recorder.commands().iter().any(|command| matches!(
        command,
        RecordedCommand::SetGlobalTexture { symbol, target: bound } if *symbol == SCREEN_SPACE_SHADOW_MAP && *bound == target
    )));
}

#[test]
fn resolve_without_material_is_a_no_op() {
    let (scene, _, _) = tagged_scene();
    let mut engine = ShadowEngine::new(settings());
    let mut shadow = ShadowPass::new(&mut engine, &scene);
    let mut recorder = CommandRecorder::new();
    run_shadow_frame(&mut shadow, &mut engine, &scene, &mut recorder);
    recorder.clear();

    let mut resolve = ResolvePass::new(ResolveConfig::default(), None);
    assert_eq!(resolve.execute(&engine, &mut recorder), 0);
    assert!(recorder.commands().is_empty());
}
