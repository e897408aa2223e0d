use anyhow::{Context, Result};
use object_shadow_atlas::cli::ReportArgs;
use object_shadow_atlas::config::ObjectShadowConfig;
use object_shadow_atlas::engine::ShadowEngine;
use object_shadow_atlas::renderable::MaterialId;
use object_shadow_atlas::renderer::{CommandRecorder, ResolvePass, ShadowPass, ShadowPassParams, VirtualTargetPool};
use object_shadow_atlas::scene::{
    SceneFile, SceneObjectData, SceneRenderableData, SceneRenderableKind, Vec3Data,
};
use std::process;

const RESOLVE_MATERIAL: MaterialId = MaterialId(0);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = ReportArgs::parse_from_env()?;
    let config = match &args.config {
        Some(path) => ObjectShadowConfig::load(path)?,
        None => ObjectShadowConfig::default(),
    };
    let scene_file = match &args.scene {
        Some(path) => SceneFile::load(path)?,
        None => demo_scene(),
    };
    let scene = scene_file.to_graph().context("Failed to build scene graph")?;
    let camera = scene_file.camera.to_camera().viewer(args.width, args.height);

    let mut engine = ShadowEngine::new(config.shadow.clone());
    let mut shadow_pass = ShadowPass::new(&mut engine, &scene);
    let mut resolve_pass = ResolvePass::new(config.resolve.clone(), Some(RESOLVE_MATERIAL));
    let mut recorder = CommandRecorder::new();

    for frame in 0..args.frames {
        let mut targets = VirtualTargetPool::new();
        recorder.clear();
        shadow_pass.configure(&mut engine, &scene, &mut targets, &mut recorder);
        let drawn = shadow_pass.execute(ShadowPassParams {
            engine: &mut engine,
            scene: &scene,
            camera: &camera,
            sink: &mut recorder,
        })?;
        resolve_pass.configure(&mut targets, &mut recorder, glam::UVec2::new(args.width, args.height));
        let instances = resolve_pass.execute(&engine, &mut recorder);
        log::info!(
            "frame {frame}: {drawn} slice(s), {} caster draw(s), {instances} resolve instance(s)",
            recorder.renderer_draw_count()
        );
    }

    print!("{}", engine.stats(&scene));
    Ok(())
}

fn demo_scene() -> SceneFile {
    let cube = |center: Vec3Data, size: f32| {
        let half = size * 0.5;
        SceneRenderableData {
            kind: SceneRenderableKind::Mesh,
            min: Vec3Data { x: center.x - half, y: center.y - half, z: center.z - half },
            max: Vec3Data { x: center.x + half, y: center.y + half, z: center.z + half },
            submeshes: 1,
            mesh: None,
            material: Some(1),
        }
    };
    SceneFile {
        tags: vec!["PerObjectShadow".to_string()],
        objects: vec![
            SceneObjectData {
                name: "Hero".to_string(),
                tag: Some("PerObjectShadow".to_string()),
                active: true,
                parent: None,
                renderables: vec![cube(Vec3Data { x: -1.5, y: 0.5, z: 0.0 }, 1.0)],
            },
            SceneObjectData {
                name: "Crate".to_string(),
                tag: Some("PerObjectShadow".to_string()),
                active: true,
                parent: None,
                renderables: vec![cube(Vec3Data { x: 1.5, y: 1.0, z: 0.0 }, 2.0)],
            },
        ],
        ..SceneFile::default()
    }
}
