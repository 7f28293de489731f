use beatscape_core::{
    audio::synth, AudioAnalyzer, BeatscapeError, FeatureFrame, InMemorySink, RenderConfig,
    RenderLoop, RenderThreading, SceneController,
};

fn config(bars: i64) -> RenderConfig {
    RenderConfig {
        width: 32,
        height: 48,
        fps: 12,
        bars,
        seed: Some(42),
        ..RenderConfig::default()
    }
}

#[test]
fn thirty_seconds_at_120_bpm_swaps_three_times() {
    let audio = synth::kick_track(30.0, 22_050, 120.0, 0.8).unwrap();
    let cfg = config(4);
    let analysis = AudioAnalyzer::new(&cfg).unwrap().analyze(&audio).unwrap();
    let grid = analysis.grid().expect("tempo detected");
    assert!((grid.bpm() - 120.0).abs() < 4.0, "bpm {}", grid.bpm());

    let mut scenes = SceneController::new(&cfg, 42, analysis.timeline(), analysis.grid()).unwrap();
    for frame in analysis.frames() {
        scenes.schedule(&frame).unwrap();
    }
    let history = scenes.finish(analysis.timeline().end);

    // Bars at 0, 4, 8 and 12 fit in 30 s at 2 s per bar; bar 16 would start past 32 s.
    assert_eq!(history.len(), 4);
    let first = history[0].start_bar;
    let starts: Vec<u64> = history.iter().map(|c| c.start_bar - first).collect();
    assert_eq!(starts, vec![0, 4, 8, 12]);
    for pair in history.windows(2) {
        let gap = pair[1].start - pair[0].start;
        assert!((gap - 4.0 * grid.bar_seconds()).abs() < 0.1, "gap {gap}");
        assert_ne!(pair[0].modules, pair[1].modules);
    }
}

#[test]
fn repeated_runs_are_identical() {
    let audio = synth::test_track(6.0, 22_050, 120.0).unwrap();
    let render = RenderLoop::new(config(1)).unwrap();

    let mut first = InMemorySink::new();
    let mut second = InMemorySink::new();
    let a = render.run(&audio, &mut first).unwrap();
    let b = render.run(&audio, &mut second).unwrap();

    assert_eq!(a, b);
    assert_eq!(first.frames(), second.frames());
}

#[test]
fn parallel_render_matches_sequential() {
    let audio = synth::test_track(4.0, 22_050, 120.0).unwrap();
    let sequential = RenderLoop::new(config(1)).unwrap();
    let parallel = sequential.clone().with_threading(RenderThreading {
        parallel: true,
        chunk_size: 5,
        threads: Some(3),
    });

    let mut seq_sink = InMemorySink::new();
    let mut par_sink = InMemorySink::new();
    let seq_report = sequential.run(&audio, &mut seq_sink).unwrap();
    let par_report = parallel.run(&audio, &mut par_sink).unwrap();

    assert_eq!(seq_report, par_report);
    assert_eq!(seq_sink.frames(), par_sink.frames());
}

#[test]
fn disabled_trail_matches_zero_decay() {
    let audio = synth::test_track(2.0, 22_050, 120.0).unwrap();
    let mut off = config(1);
    off.effects.feedback = false;
    let mut zero = config(1);
    zero.effects.trail_decay = Some(0.0);

    let mut off_sink = InMemorySink::new();
    let mut zero_sink = InMemorySink::new();
    RenderLoop::new(off).unwrap().run(&audio, &mut off_sink).unwrap();
    RenderLoop::new(zero).unwrap().run(&audio, &mut zero_sink).unwrap();
    assert_eq!(off_sink.frames(), zero_sink.frames());
}

#[test]
fn different_seeds_pick_different_scenes() {
    let audio = synth::test_track(8.0, 22_050, 120.0).unwrap();
    let history = |seed: u64| {
        let cfg = RenderConfig {
            seed: Some(seed),
            ..config(1)
        };
        let mut sink = InMemorySink::new();
        RenderLoop::new(cfg).unwrap().run(&audio, &mut sink).unwrap().compositions
    };
    let a = history(1);
    let b = history(2);
    assert!(a.iter().zip(&b).any(|(x, y)| x.modules != y.modules || x.palette != y.palette));
}

#[test]
fn rejected_configs_never_reach_the_sink() {
    for bad in [
        RenderConfig {
            kick_threshold: 1.5,
            ..config(4)
        },
        RenderConfig {
            complexity: 0.0,
            ..config(4)
        },
        RenderConfig {
            speed: -1.0,
            ..config(4)
        },
        config(0),
    ] {
        let err = RenderLoop::new(bad).unwrap_err();
        assert!(err.is_config(), "{err}");
    }
}

#[test]
fn window_bounds_the_render() {
    let audio = synth::test_track(6.0, 22_050, 120.0).unwrap();
    let cfg = RenderConfig {
        start: 1.0,
        end: Some(3.0),
        ..config(1)
    };
    let mut sink = InMemorySink::new();
    let report = RenderLoop::new(cfg).unwrap().run(&audio, &mut sink).unwrap();
    assert_eq!(report.frames, 24);
    assert_eq!(report.compositions[0].start, 1.0);
    assert_eq!(report.compositions.last().unwrap().end, Some(3.0));
}

#[test]
fn failing_frame_stops_the_render_and_closes_the_sink() {
    let audio = synth::test_track(3.0, 22_050, 120.0).unwrap();
    let cfg = config(1);
    let analysis = AudioAnalyzer::new(&cfg).unwrap().analyze(&audio).unwrap();
    let frames: Vec<FeatureFrame> = analysis
        .frames()
        .map(|mut frame| {
            if frame.index == 5 {
                frame.bass = f32::NAN;
            }
            frame
        })
        .collect();

    let threadings = [
        RenderThreading::default(),
        RenderThreading {
            parallel: true,
            chunk_size: 4,
            threads: Some(2),
        },
    ];
    for threading in threadings {
        let mut sink = InMemorySink::new();
        let err = RenderLoop::new(cfg.clone())
            .unwrap()
            .with_threading(threading)
            .render_frames(analysis.timeline(), analysis.grid(), frames.clone().into_iter(), 42, &mut sink)
            .unwrap_err();

        assert!(matches!(err, BeatscapeError::Render(_)), "{err}");
        assert_eq!(sink.frames().len(), 5);
        assert!(sink.is_finished());
    }
}
