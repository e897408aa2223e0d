use object_shadow_atlas::config::{
    LightSource, ObjectShadowConfig, ScreenShadowFormat, SliceResolution, UpdateMethod,
};
use object_shadow_atlas::scene::{ObjectId, SceneFile, ShadowScene};
use std::fs;
use tempfile::tempdir;

#[test]
fn loads_partial_config_file() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("shadow.json");
    fs::write(
        &path,
        r#"{
            "shadow": {
                "max_objects": 8,
                "slice_max_resolution": 1024,
                "update_method": "on_init",
                "light_source": "main_directional_light"
            },
            "resolve": { "resolve_to_texture": true, "texture_format": "rgba8" }
        }"#,
    )
    .expect("write config");

    let config = ObjectShadowConfig::load(&path).expect("config loads");
    assert_eq!(config.shadow.max_objects, 8);
    assert_eq!(config.shadow.slice_max_resolution, SliceResolution::R1024);
    assert_eq!(config.shadow.slice_min_resolution, SliceResolution::R128);
    assert_eq!(config.shadow.update_method, UpdateMethod::OnInit);
    assert_eq!(config.shadow.light_source, LightSource::MainDirectionalLight);
    assert!(config.resolve.resolve_to_texture);
    assert_eq!(config.resolve.texture_format, ScreenShadowFormat::Rgba8);
}

#[test]
fn broken_config_falls_back_to_defaults() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("shadow.json");
    fs::write(&path, "{ not json").expect("write config");

    let err = ObjectShadowConfig::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config file"));
    let config = ObjectShadowConfig::load_or_default(&path);
    assert_eq!(config.shadow.max_objects, 4);

    let missing = ObjectShadowConfig::load_or_default(dir.path().join("missing.json"));
    assert_eq!(missing.shadow.tag, "PerObjectShadow");
}

#[test]
fn scene_file_loads_from_disk() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("scene.json");
    fs::write(
        &path,
        r#"{
            "tags": ["PerObjectShadow"],
            "main_light_euler": { "x": 90, "y": 0, "z": 0 },
            "objects": [
                { "name": "statue", "tag": "PerObjectShadow",
                  "renderables": [{ "min": {"x": -0.5, "y": 0, "z": -0.5}, "max": {"x": 0.5, "y": 3, "z": 0.5}, "material": 1 }] },
                { "name": "hidden", "active": false }
            ]
        }"#,
    )
    .expect("write scene");

    let file = SceneFile::load(&path).expect("scene loads");
    let scene = file.to_graph().expect("graph builds");
    assert_eq!(scene.find_objects_with_tag("PerObjectShadow").expect("tag"), vec![ObjectId(0)]);
    assert!(!scene.is_active_in_hierarchy(ObjectId(1)));
    let light = scene.main_light_rotation().expect("main light") * glam::Vec3::Z;
    assert!((light - glam::Vec3::NEG_Y).length() < 1e-5, "{light:?}");
}
