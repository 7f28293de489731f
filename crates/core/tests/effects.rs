use beatscape_core::{
    render::BlendMode, scene::SceneEffects, Compositor, FeatureFrame, FeedbackTrail, Layer,
    ModuleKind, PostProcessor, Raster, RenderConfig,
};

fn layer(module: ModuleKind, color: [u8; 4], opacity: f32) -> Layer {
    Layer {
        module,
        slot: module.slot(),
        blend: module.blend(),
        opacity,
        raster: Raster::filled(4, 4, color),
    }
}

#[test]
fn compositing_ignores_storage_order() {
    let layers = vec![
        layer(ModuleKind::Supershape, [120, 20, 20, 160], 1.0),
        layer(ModuleKind::Terrain, [0, 40, 80, 255], 1.0),
        layer(ModuleKind::Dust, [30, 30, 30, 60], 0.7),
        layer(ModuleKind::CrossHatch, [10, 60, 10, 90], 0.5),
        layer(ModuleKind::LightRays, [40, 40, 0, 80], 1.0),
    ];
    let compositor = Compositor::new(4, 4);
    let forward = compositor.composite(&layers).unwrap();

    let mut reversed = layers.clone();
    reversed.reverse();
    assert_eq!(compositor.composite(&reversed).unwrap(), forward);

    let mut rotated = layers;
    rotated.rotate_left(2);
    assert_eq!(compositor.composite(&rotated).unwrap(), forward);
}

#[test]
fn additive_layers_brighten() {
    let base = layer(ModuleKind::Terrain, [50, 50, 50, 255], 1.0);
    let glow = layer(ModuleKind::Dust, [40, 0, 0, 40], 1.0);
    assert_eq!(glow.blend, BlendMode::Add);
    let out = Compositor::new(4, 4).composite(&[base, glow]).unwrap();
    assert_eq!(out.pixel(0, 0), [90, 50, 50, 255]);
}

#[test]
fn zero_decay_trail_is_the_identity() {
    let mut trail = FeedbackTrail::new(0.0);
    for value in [200u8, 10, 90] {
        let frame = Raster::filled(3, 3, [value, value / 2, 0, 255]);
        assert_eq!(trail.apply(frame.clone()).unwrap(), frame);
    }
}

#[test]
fn trail_keeps_fading_copies_of_bright_frames() {
    let mut trail = FeedbackTrail::new(0.5);
    trail.apply(Raster::filled(2, 2, [200, 200, 200, 255])).unwrap();
    let dark = trail.apply(Raster::filled(2, 2, [0, 0, 0, 255])).unwrap();
    assert_eq!(dark.pixel(0, 0), [100, 100, 100, 255]);
}

fn kick_frame(index: u64, bass: f32) -> FeatureFrame {
    FeatureFrame {
        index,
        time: index as f32 / 24.0,
        bass,
        accent: 1.0,
        kick: true,
        ..FeatureFrame::default()
    }
}

fn glitch_count(kick_threshold: f32, peak_bass: f32) -> usize {
    let config = RenderConfig {
        kick_threshold,
        ..RenderConfig::default()
    };
    let post = PostProcessor::new(&config, 11);
    (0..48)
        .map(|i| kick_frame(i, peak_bass * (i % 12) as f32 / 11.0))
        .filter(|frame| {
            post.pre_trail(Raster::filled(8, 8, [90, 30, 200, 255]), frame, SceneEffects::default())
                .unwrap()
                .glitched
        })
        .count()
}

#[test]
fn glitch_stays_quiet_below_the_kick_threshold() {
    assert_eq!(glitch_count(0.8, 0.75), 0);
    assert!(glitch_count(0.6, 0.75) > 0);
}

#[test]
fn disabled_glitch_never_fires() {
    let mut config = RenderConfig {
        kick_threshold: 0.1,
        ..RenderConfig::default()
    };
    config.effects.glitch = false;
    let post = PostProcessor::new(&config, 3);
    let pre = post
        .pre_trail(Raster::filled(8, 8, [255, 0, 0, 255]), &kick_frame(0, 1.0), SceneEffects::default())
        .unwrap();
    assert!(!pre.glitched);
    assert_eq!(pre.raster, Raster::filled(8, 8, [255, 0, 0, 255]));
}
