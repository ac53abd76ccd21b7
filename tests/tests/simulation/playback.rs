use std::fs;

use bitladder::{SessionBuilder, Strategy, VideoCatalog};
use bitladder_abr::{
    FeatureRow, FnModel, InferenceError, PolicyModel, SelectionReason, SharedBandwidthMeter,
    StateWindow,
};
use bitladder_tests::{PlaybackModel, simulate};
use rstest::rstest;
use tempfile::TempDir;

use crate::common::{catalog, debug_tracing_setup, temp_dir, tracing_setup};

const ENVIVIO_CHUNKS: usize = 48;

fn prefer_top() -> Box<dyn PolicyModel> {
    Box::new(FnModel(
        |_: &StateWindow| -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5])
        },
    ))
}

fn unavailable() -> Box<dyn PolicyModel> {
    Box::new(FnModel(
        |_: &StateWindow| -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::Unavailable("no model loaded".into()))
        },
    ))
}

/// Highest level whose next chunk fits in one megabyte.
fn megabyte_budget() -> Box<dyn PolicyModel> {
    Box::new(FnModel(
        |window: &StateWindow| -> Result<Vec<f32>, InferenceError> {
            Ok(window.row(FeatureRow::NextChunkSizes)[..6]
                .iter()
                .enumerate()
                .map(|(position, &mb)| {
                    if mb <= 1.0 {
                        f32::from(u8::try_from(position).unwrap()) + 1.0
                    } else {
                        0.0
                    }
                })
                .collect())
        },
    ))
}

#[rstest]
fn utility_playback_fills_buffer_then_climbs(_tracing_setup: (), catalog: VideoCatalog) {
    let meter = SharedBandwidthMeter::default();
    let mut session = SessionBuilder::new(&catalog)
        .video("envivio")
        .build(meter.clone())
        .unwrap();

    let report = simulate(
        &mut session,
        &meter,
        &PlaybackModel::default(),
        ENVIVIO_CHUNKS,
    );

    assert_eq!(report.selected.len(), ENVIVIO_CHUNKS);
    // Starts at the top, drops to the bottom with a thin buffer.
    assert_eq!(report.selected[0], 0);
    assert_eq!(report.selected[1], 5);
    assert!(report.selected[2..].contains(&0));
    // Only the first, top-quality download stalls: 4.3 Mbps for 4 s over 3 Mbps.
    assert_eq!(report.rebuffer_ms, 5_733);
    assert_eq!(session.selection_reason(), SelectionReason::Adaptive);
    assert!(session.qoe().is_empty());
}

#[rstest]
fn policy_playback_scores_every_media_chunk(_tracing_setup: (), catalog: VideoCatalog) {
    let meter = SharedBandwidthMeter::default();
    let mut session = SessionBuilder::new(&catalog)
        .video("envivio")
        .strategy(Strategy::Policy(prefer_top()))
        .build(meter.clone())
        .unwrap();

    let report = simulate(
        &mut session,
        &meter,
        &PlaybackModel::default(),
        ENVIVIO_CHUNKS,
    );

    assert_eq!(report.selected[0], 1);
    assert!(report.selected[1..].iter().all(|&index| index == 0));
    assert_eq!(report.switches, 1);

    let qoe = session.qoe();
    assert_eq!(qoe.len(), ENVIVIO_CHUNKS - 1);
    assert_eq!(qoe.cumulative_bitrate(), 4300.0 * 47.0);
}

#[rstest]
fn failing_model_keeps_initial_track(_tracing_setup: (), catalog: VideoCatalog) {
    let meter = SharedBandwidthMeter::default();
    let mut session = SessionBuilder::new(&catalog)
        .video("forest")
        .strategy(Strategy::from_name("pensieve", unavailable).unwrap())
        .build(meter.clone())
        .unwrap();

    let report = simulate(&mut session, &meter, &PlaybackModel::default(), 20);

    assert!(report.selected.iter().all(|&index| index == 1));
    assert_eq!(report.switches, 0);
    assert!(session.qoe().is_empty());
}

#[rstest]
fn policy_reads_sizes_from_chunk_size_dir(
    _debug_tracing_setup: (),
    catalog: VideoCatalog,
    temp_dir: TempDir,
) {
    let envivio = catalog.get("envivio").unwrap();
    let video_dir = temp_dir.path().join("envivio");
    fs::create_dir(&video_dir).unwrap();
    for (level, variant) in envivio.ladder().variants().iter().enumerate() {
        // Bytes of one 4 s chunk at the level's bitrate.
        let bytes = variant.bitrate_bps().unwrap() / 2;
        let sizes: Vec<String> = (0..ENVIVIO_CHUNKS).map(|_| bytes.to_string()).collect();
        fs::write(video_dir.join(format!("video_size_{level}")), sizes.join(" ")).unwrap();
    }

    let meter = SharedBandwidthMeter::default();
    let mut session = SessionBuilder::new(&catalog)
        .video("envivio")
        .strategy(Strategy::Policy(megabyte_budget()))
        .chunk_size_dir(temp_dir.path())
        .build(meter.clone())
        .unwrap();

    let report = simulate(&mut session, &meter, &PlaybackModel::default(), 10);

    // 1850 kbps is the largest level under 1 MB per chunk.
    assert!(report.selected[1..].iter().all(|&index| index == 2));
}

#[rstest]
#[case("bola")]
#[case("pensieve")]
fn strategies_by_name_stay_on_the_ladder(
    _tracing_setup: (),
    catalog: VideoCatalog,
    #[case] name: &str,
) {
    let meter = SharedBandwidthMeter::default();
    let model = PlaybackModel {
        throughput_bps: vec![800_000, 5_000_000, 1_500_000, 300_000],
        ..PlaybackModel::default()
    };

    for id in catalog.ids() {
        let mut session = SessionBuilder::new(&catalog)
            .video(id)
            .strategy(Strategy::from_name(name, prefer_top).unwrap())
            .build(meter.clone())
            .unwrap();
        let report = simulate(&mut session, &meter, &model, 24);
        assert_eq!(report.selected.len(), 24);
        assert!(report.selected.iter().all(|&index| index < 6), "{id}: {report:?}");
    }
}
